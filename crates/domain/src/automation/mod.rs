//! Automation — trigger → optional condition gate → ordered command list.
//!
//! Automations let the system run commands on a schedule without manual
//! intervention. Each automation has a [`Trigger`] that determines when it
//! is due, an optional condition gate (see [`crate::condition`]) that must
//! hold at fire time, and one or more command strings executed in order.

mod trigger;

pub mod schedule;

pub use trigger::Trigger;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::AutomationId;

/// A persisted rule combining a trigger, an optional condition gate, and
/// one or more commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    pub id: AutomationId,
    pub name: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub run_at_boot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_delay_ms: Option<u64>,
    /// Gate expression or chain text; absent means "always fire".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    pub commands: Vec<String>,
    /// Next fire instant in epoch seconds; `null` means "uncomputed" and
    /// is lazily backfilled by the scheduler.
    #[serde(default)]
    pub next_at: Option<i64>,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `commands` is empty ([`ValidationError::NoCommands`])
    /// - an `AtTime` trigger carries a time outside strict `HH:MM`
    ///   ([`ValidationError::BadTime`])
    pub fn validate(&self) -> Result<(), HubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.commands.is_empty() {
            return Err(ValidationError::NoCommands.into());
        }
        if let Trigger::AtTime { time, .. } = &self.trigger {
            if schedule::parse_hhmm(time).is_none() {
                return Err(ValidationError::BadTime.into());
            }
        }
        Ok(())
    }
}

/// Versioned persisted document holding the whole rule collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDocument {
    pub version: u32,
    pub automations: Vec<Automation>,
}

impl AutomationDocument {
    /// Document schema version written by this build.
    pub const CURRENT_VERSION: u32 = 1;

    /// Whether an automation with `id` is present.
    #[must_use]
    pub fn contains_id(&self, id: AutomationId) -> bool {
        self.automations.iter().any(|a| a.id == id)
    }

    /// Find an automation by id.
    #[must_use]
    pub fn find(&self, id: AutomationId) -> Option<&Automation> {
        self.automations.iter().find(|a| a.id == id)
    }
}

impl Default for AutomationDocument {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            automations: Vec::new(),
        }
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    enabled: Option<bool>,
    trigger: Option<Trigger>,
    run_at_boot: bool,
    boot_delay_ms: Option<u64>,
    conditions: Option<String>,
    commands: Vec<String>,
    next_at: Option<i64>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn run_at_boot(mut self, run_at_boot: bool) -> Self {
        self.run_at_boot = run_at_boot;
        self
    }

    #[must_use]
    pub fn boot_delay_ms(mut self, delay_ms: u64) -> Self {
        self.boot_delay_ms = Some(delay_ms);
        self
    }

    #[must_use]
    pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    #[must_use]
    pub fn commands(mut self, commands: Vec<String>) -> Self {
        self.commands = commands;
        self
    }

    #[must_use]
    pub fn next_at(mut self, next_at: i64) -> Self {
        self.next_at = Some(next_at);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if required fields are missing or
    /// empty.
    pub fn build(self) -> Result<Automation, HubError> {
        let automation = Automation {
            id: self.id.unwrap_or(AutomationId::new(0)),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            trigger: self.trigger.unwrap_or(Trigger::Interval { interval_ms: 0 }),
            run_at_boot: self.run_at_boot,
            boot_delay_ms: self.boot_delay_ms,
            conditions: self.conditions,
            commands: self.commands,
            next_at: self.next_at,
        };
        automation.validate()?;
        Ok(automation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_automation() -> Automation {
        Automation::builder()
            .id(AutomationId::new(1))
            .name("Evening lights")
            .trigger(Trigger::AtTime {
                time: "18:30".to_string(),
                days: None,
            })
            .command("lights on")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_valid_automation_when_required_fields_provided() {
        let auto = valid_automation();
        assert_eq!(auto.name, "Evening lights");
        assert!(auto.enabled);
        assert!(auto.conditions.is_none());
        assert_eq!(auto.commands.len(), 1);
        assert!(auto.next_at.is_none());
    }

    #[test]
    fn should_default_to_enabled_when_not_specified() {
        assert!(valid_automation().enabled);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Automation::builder().command("x").build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_commands_is_empty() {
        let result = Automation::builder().name("No commands").build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::NoCommands))
        ));
    }

    #[test]
    fn should_return_validation_error_for_malformed_time() {
        let result = Automation::builder()
            .name("Bad time")
            .trigger(Trigger::AtTime {
                time: "9:00".to_string(),
                days: None,
            })
            .command("x")
            .build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::BadTime))
        ));
    }

    #[test]
    fn should_accumulate_multiple_commands() {
        let auto = Automation::builder()
            .name("Multi")
            .trigger(Trigger::Interval { interval_ms: 60_000 })
            .command("first")
            .command("second")
            .build()
            .unwrap();
        assert_eq!(auto.commands, vec!["first", "second"]);
    }

    #[test]
    fn should_serialize_with_flat_trigger_fields() {
        let auto = Automation::builder()
            .id(AutomationId::new(7))
            .name("Morning check")
            .trigger(Trigger::AtTime {
                time: "09:00".to_string(),
                days: Some("mon,wed,fri".to_string()),
            })
            .command("status")
            .build()
            .unwrap();
        let value = serde_json::to_value(&auto).unwrap();
        assert_eq!(value["type"], "atTime");
        assert_eq!(value["time"], "09:00");
        assert_eq!(value["days"], "mon,wed,fri");
        assert_eq!(value["id"], 7);
        assert_eq!(value["nextAt"], serde_json::Value::Null);
        // presence is conditional on the trigger type
        assert!(value.get("delayMs").is_none());
        assert!(value.get("intervalMs").is_none());
        assert!(value.get("runAtBoot").is_none());
    }

    #[test]
    fn should_roundtrip_automation_through_serde_json() {
        let auto = Automation::builder()
            .id(AutomationId::new(99))
            .name("Roundtrip")
            .trigger(Trigger::AfterDelay { delay_ms: 1500 })
            .run_at_boot(true)
            .boot_delay_ms(2000)
            .conditions("TEMP>30")
            .command("fan on")
            .next_at(1_760_000_000)
            .build()
            .unwrap();
        let json = serde_json::to_string(&auto).unwrap();
        let parsed: Automation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, auto);
    }

    #[test]
    fn should_deserialize_flat_wire_format() {
        let json = r#"{
            "id": 12,
            "name": "Water plants",
            "enabled": true,
            "type": "interval",
            "intervalMs": 60000,
            "commands": ["pump on", "pump off"],
            "nextAt": null
        }"#;
        let auto: Automation = serde_json::from_str(json).unwrap();
        assert_eq!(auto.id, AutomationId::new(12));
        assert_eq!(auto.trigger, Trigger::Interval { interval_ms: 60_000 });
        assert!(!auto.run_at_boot);
        assert!(auto.next_at.is_none());
    }

    #[test]
    fn should_default_document_to_current_version_and_no_automations() {
        let doc = AutomationDocument::default();
        assert_eq!(doc.version, AutomationDocument::CURRENT_VERSION);
        assert!(doc.automations.is_empty());
    }

    #[test]
    fn should_find_automation_by_id_in_document() {
        let mut doc = AutomationDocument::default();
        doc.automations.push(valid_automation());
        assert!(doc.contains_id(AutomationId::new(1)));
        assert!(doc.find(AutomationId::new(1)).is_some());
        assert!(!doc.contains_id(AutomationId::new(2)));
    }
}
