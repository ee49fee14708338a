//! Thin line-command surface: `automation <sub> key=value …` parsing and
//! dispatch into the [`AutomationService`].
//!
//! A leading `validate` keyword runs the same operation in dry-run mode:
//! every argument check happens, nothing observable changes, and the
//! sentinel `VALID` comes back.

use rulehub_app::ports::{AutomationStore, CommandExecutor, SensorReader};
use rulehub_app::services::automation_service::{AddAutomation, AutomationService, Mode};
use rulehub_domain::automation::{Automation, Trigger};
use rulehub_domain::error::HubError;
use rulehub_domain::id::AutomationId;

/// Dispatch one input line and return the reply text.
pub async fn dispatch<S, X, R>(service: &AutomationService<S, X, R>, line: &str) -> String
where
    S: AutomationStore,
    X: CommandExecutor,
    R: SensorReader,
{
    let trimmed = line.trim();
    let (mode, rest) = match strip_keyword(trimmed, "validate") {
        Some(rest) => (Mode::ValidateOnly, rest),
        None => (Mode::Apply, trimmed),
    };
    let Some(rest) = strip_keyword(rest, "automation") else {
        return "Unknown command. Try: automation <list|add|enable|disable|delete|run|sanitize|recompute>"
            .to_string();
    };
    let (sub, args) = split_word(rest);

    match sub.to_ascii_lowercase().as_str() {
        "list" => match service.list().await {
            Ok(automations) => format_list(&automations),
            Err(err) => format!("Error: {err}"),
        },
        "add" => match parse_add(args) {
            Ok(request) => reply(service.add(request, mode).await),
            Err(message) => message,
        },
        "enable" => match parse_id(args) {
            Some(id) => reply(service.set_enabled(id, true, mode).await),
            None => "Usage: automation enable id=<id>".to_string(),
        },
        "disable" => match parse_id(args) {
            Some(id) => reply(service.set_enabled(id, false, mode).await),
            None => "Usage: automation disable id=<id>".to_string(),
        },
        "delete" => match parse_id(args) {
            Some(id) => reply(service.delete(id, mode).await),
            None => "Usage: automation delete id=<id>".to_string(),
        },
        "run" => match parse_id(args) {
            Some(id) => reply(service.run(id, mode).await),
            None => "Usage: automation run id=<id>".to_string(),
        },
        "sanitize" => reply(service.sanitize(mode).await),
        "recompute" => reply(service.recompute(mode).await),
        _ => "Unknown automation command. Use: list, add, enable, disable, delete, run, sanitize, recompute"
            .to_string(),
    }
}

fn reply(result: Result<String, HubError>) -> String {
    match result {
        Ok(message) => message,
        Err(err) => format!("Error: {err}"),
    }
}

fn format_list(automations: &[Automation]) -> String {
    if automations.is_empty() {
        return "No automations".to_string();
    }
    automations
        .iter()
        .map(|auto| {
            format!(
                "id={} name={} enabled={} trigger={} nextAt={}",
                auto.id,
                auto.name,
                auto.enabled,
                auto.trigger,
                auto.next_at.map_or("null".to_string(), |at| at.to_string()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip a leading keyword (case-insensitive, whole word) and return the
/// remainder with leading whitespace removed.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let text = text.trim_start();
    if text.len() >= keyword.len() && text[..keyword.len()].eq_ignore_ascii_case(keyword) {
        let rest = &text[keyword.len()..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim_start());
        }
    }
    None
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

/// Extract the value of `key=` from an argument string. Values may be
/// double-quoted to include spaces; unquoted values run until the next
/// `key=` token.
fn arg_value(args: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=");
    let bytes = args.as_bytes();
    let mut from = 0;
    let value_start = loop {
        let rel = args[from..].find(&needle)?;
        let pos = from + rel;
        if pos == 0 || bytes[pos - 1].is_ascii_whitespace() {
            break pos + needle.len();
        }
        from = pos + needle.len();
    };

    let rest = &args[value_start..];
    let rest_trimmed = rest.trim_start();
    if let Some(quoted) = rest_trimmed.strip_prefix('"') {
        let end = quoted.find('"').unwrap_or(quoted.len());
        return Some(quoted[..end].to_string());
    }

    // Unquoted: stop at the start of the next key=value token.
    let mut end = rest.len();
    let mut search = 0;
    while let Some(space) = rest[search..].find(' ') {
        let idx = search + space;
        let tail = rest[idx..].trim_start();
        if let Some(eq) = tail.find('=') {
            let token = &tail[..eq];
            if !token.is_empty() && !token.contains(' ') {
                end = idx;
                break;
            }
        }
        search = idx + 1;
    }
    Some(rest[..end].trim().to_string())
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("1")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
}

fn parse_id(args: &str) -> Option<AutomationId> {
    let id: AutomationId = arg_value(args, "id")?.trim().parse().ok()?;
    id.is_valid().then_some(id)
}

fn parse_millis(args: &str, key: &str) -> Result<u64, String> {
    arg_value(args, key)
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| format!("Error: {key} must be numeric (milliseconds)"))
}

fn parse_add(args: &str) -> Result<AddAutomation, String> {
    let name = arg_value(args, "name").unwrap_or_default();
    if name.is_empty() {
        return Err("Error: missing name".to_string());
    }

    let type_norm = arg_value(args, "type")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let trigger = match type_norm.as_str() {
        "attime" => Trigger::AtTime {
            time: arg_value(args, "time").unwrap_or_default(),
            days: arg_value(args, "days").filter(|d| !d.is_empty()),
        },
        "afterdelay" => Trigger::AfterDelay {
            delay_ms: parse_millis(args, "delayms")?,
        },
        "interval" => Trigger::Interval {
            interval_ms: parse_millis(args, "intervalms")?,
        },
        "" => return Err("Error: missing type (atTime|afterDelay|interval)".to_string()),
        _ => return Err("Error: invalid type (expected atTime|afterDelay|interval)".to_string()),
    };

    let commands_csv = arg_value(args, "commands")
        .filter(|c| !c.is_empty())
        .or_else(|| arg_value(args, "command"))
        .unwrap_or_default();
    let commands: Vec<String> = commands_csv
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if commands.is_empty() {
        return Err(
            "Error: missing commands (provide commands=<cmd1;cmd2;...> or command=<cmd>)"
                .to_string(),
        );
    }

    let boot_delay_ms = match arg_value(args, "bootdelayms").filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            raw.trim()
                .parse()
                .map_err(|_| "Error: bootdelayms must be numeric (milliseconds)".to_string())?,
        ),
        None => None,
    };

    let id = match arg_value(args, "id").filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            raw.trim()
                .parse()
                .map(AutomationId::new)
                .map_err(|_| "Error: id must be numeric".to_string())?,
        ),
        None => None,
    };

    Ok(AddAutomation {
        name,
        trigger,
        id,
        enabled: arg_value(args, "enabled").as_deref().map(parse_bool).unwrap_or(false),
        run_at_boot: arg_value(args, "runatboot").as_deref().map(parse_bool).unwrap_or(false),
        boot_delay_ms,
        conditions: arg_value(args, "condition").filter(|c| !c.trim().is_empty()),
        commands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── arg_value ──────────────────────────────────────────────────

    #[test]
    fn should_extract_unquoted_value_up_to_next_key() {
        let args = "name=Evening lights type=atTime time=18:30";
        assert_eq!(arg_value(args, "name").unwrap(), "Evening lights");
        assert_eq!(arg_value(args, "type").unwrap(), "atTime");
        assert_eq!(arg_value(args, "time").unwrap(), "18:30");
    }

    #[test]
    fn should_extract_quoted_value_with_spaces_and_equals() {
        let args = r#"name="Morning = routine" type=interval intervalms=1000"#;
        assert_eq!(arg_value(args, "name").unwrap(), "Morning = routine");
    }

    #[test]
    fn should_not_match_key_inside_another_key() {
        let args = "commands=print hi";
        assert_eq!(arg_value(args, "command"), None);
        assert_eq!(arg_value(args, "commands").unwrap(), "print hi");
    }

    #[test]
    fn should_return_none_for_absent_key() {
        assert_eq!(arg_value("name=x", "type"), None);
    }

    // ── parse_add ──────────────────────────────────────────────────

    #[test]
    fn should_parse_full_add_arguments() {
        let request = parse_add(
            "name=Night fan type=atTime time=22:00 days=mon,tue \
             condition=TEMP>25 commands=fan on;fan low enabled=1 runatboot=true bootdelayms=500",
        )
        .unwrap();
        assert_eq!(request.name, "Night fan");
        assert_eq!(
            request.trigger,
            Trigger::AtTime {
                time: "22:00".to_string(),
                days: Some("mon,tue".to_string()),
            }
        );
        assert_eq!(request.conditions.as_deref(), Some("TEMP>25"));
        assert_eq!(request.commands, vec!["fan on", "fan low"]);
        assert!(request.enabled);
        assert!(request.run_at_boot);
        assert_eq!(request.boot_delay_ms, Some(500));
    }

    #[test]
    fn should_accept_single_command_fallback() {
        let request = parse_add("name=x type=interval intervalms=1000 command=ping").unwrap();
        assert_eq!(request.commands, vec!["ping"]);
    }

    #[test]
    fn should_reject_missing_name() {
        let err = parse_add("type=interval intervalms=1000 command=ping").unwrap_err();
        assert_eq!(err, "Error: missing name");
    }

    #[test]
    fn should_reject_missing_type() {
        let err = parse_add("name=x command=ping").unwrap_err();
        assert!(err.contains("missing type"));
    }

    #[test]
    fn should_reject_unknown_type() {
        let err = parse_add("name=x type=cron command=ping").unwrap_err();
        assert!(err.contains("invalid type"));
    }

    #[test]
    fn should_reject_non_numeric_interval() {
        let err = parse_add("name=x type=interval intervalms=soon command=ping").unwrap_err();
        assert_eq!(err, "Error: intervalms must be numeric (milliseconds)");
    }

    #[test]
    fn should_reject_missing_commands() {
        let err = parse_add("name=x type=interval intervalms=1000").unwrap_err();
        assert!(err.contains("missing commands"));
    }

    // ── keywords ───────────────────────────────────────────────────

    #[test]
    fn should_strip_keywords_case_insensitively() {
        assert_eq!(strip_keyword("AUTOMATION list", "automation"), Some("list"));
        assert_eq!(strip_keyword("automation", "automation"), Some(""));
        assert_eq!(strip_keyword("automations list", "automation"), None);
    }

    #[test]
    fn should_parse_id_argument() {
        assert_eq!(parse_id("id=42"), Some(AutomationId::new(42)));
        assert_eq!(parse_id("id=0"), None);
        assert_eq!(parse_id("id=abc"), None);
        assert_eq!(parse_id("name=x"), None);
    }
}
