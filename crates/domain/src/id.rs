//! Numeric automation identifiers.
//!
//! Identifiers are drawn from a coarse clock plus a bounded random
//! perturbation rather than a monotonic counter, so uniqueness is
//! probabilistic and enforced after the fact by the store's sanitize
//! operation. Zero never identifies a real automation; it marks a corrupt
//! or half-written entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for an [`Automation`](crate::automation::Automation).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AutomationId(i64);

impl AutomationId {
    /// Wrap a raw identifier value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Access the raw identifier value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Whether this id can identify a stored automation.
    ///
    /// Zero is the sentinel for corrupt entries and is skipped by the
    /// scheduler.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<i64> for AutomationId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AutomationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AutomationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = AutomationId::new(1_723_456_789);
        let text = id.to_string();
        let parsed: AutomationId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_plain_number() {
        let id = AutomationId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let parsed: AutomationId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_treat_zero_as_invalid() {
        assert!(!AutomationId::new(0).is_valid());
        assert!(AutomationId::new(1).is_valid());
        assert!(AutomationId::new(-7).is_valid());
    }

    #[test]
    fn should_return_error_when_parsing_garbage() {
        let result: Result<AutomationId, _> = "not-a-number".parse();
        assert!(result.is_err());
    }
}
