//! Trigger — the scheduling rule that determines when an automation is due.

use serde::{Deserialize, Serialize};

/// Describes when an automation should fire.
///
/// Serialized with a flat `type` discriminant so trigger fields sit beside
/// the automation's own fields in the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Trigger {
    /// Fires at a local wall-clock time, optionally restricted to a set of
    /// weekdays given as comma-separated 3-letter tokens (`"mon,wed,fri"`).
    #[serde(rename_all = "camelCase")]
    AtTime {
        /// Strict `HH:MM`, 24-hour.
        time: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days: Option<String>,
    },
    /// Fires once, a fixed delay after it is scheduled.
    #[serde(rename_all = "camelCase")]
    AfterDelay { delay_ms: u64 },
    /// Fires repeatedly at a fixed period.
    #[serde(rename_all = "camelCase")]
    Interval { interval_ms: u64 },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AtTime { time, days: None } => write!(f, "at_time({time})"),
            Self::AtTime {
                time,
                days: Some(days),
            } => write!(f, "at_time({time}, {days})"),
            Self::AfterDelay { delay_ms } => write!(f, "after_delay({delay_ms}ms)"),
            Self::Interval { interval_ms } => write!(f, "interval({interval_ms}ms)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_type_discriminant_in_camel_case() {
        let json = serde_json::to_value(Trigger::AtTime {
            time: "09:00".to_string(),
            days: None,
        })
        .unwrap();
        assert_eq!(json["type"], "atTime");

        let json = serde_json::to_value(Trigger::AfterDelay { delay_ms: 1500 }).unwrap();
        assert_eq!(json["type"], "afterDelay");
        assert_eq!(json["delayMs"], 1500);

        let json = serde_json::to_value(Trigger::Interval { interval_ms: 60_000 }).unwrap();
        assert_eq!(json["type"], "interval");
        assert_eq!(json["intervalMs"], 60_000);
    }

    #[test]
    fn should_omit_days_when_absent() {
        let json = serde_json::to_value(Trigger::AtTime {
            time: "09:00".to_string(),
            days: None,
        })
        .unwrap();
        assert!(json.get("days").is_none());
    }

    #[test]
    fn should_roundtrip_triggers_through_serde_json() {
        let triggers = vec![
            Trigger::AtTime {
                time: "23:59".to_string(),
                days: Some("sat,sun".to_string()),
            },
            Trigger::AfterDelay { delay_ms: 500 },
            Trigger::Interval { interval_ms: 1000 },
        ];
        for trigger in &triggers {
            let json = serde_json::to_string(trigger).unwrap();
            let parsed: Trigger = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, trigger);
        }
    }

    #[test]
    fn should_display_trigger_variants() {
        let t = Trigger::AtTime {
            time: "09:00".to_string(),
            days: Some("mon".to_string()),
        };
        assert_eq!(t.to_string(), "at_time(09:00, mon)");
        assert_eq!(
            Trigger::AfterDelay { delay_ms: 1500 }.to_string(),
            "after_delay(1500ms)"
        );
        assert_eq!(
            Trigger::Interval { interval_ms: 60_000 }.to_string(),
            "interval(60000ms)"
        );
    }
}
