//! Condition expression — a single `sensor operator literal` comparison.

use std::fmt;

use crate::sensor::{MAX_RANGING_OBJECTS, SensorSnapshot, TimeOfDay};

use super::ChainReason;

/// Tolerance for numeric `=` / `!=` comparisons.
///
/// Sensor readings are noisy floats; exact float equality would make `=`
/// useless in practice.
pub const NUMERIC_EPSILON: f32 = 0.1;

/// Comparison operator between a sensor reading and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterOrEqual,
    LessOrEqual,
    NotEqual,
    Greater,
    Less,
    Equal,
}

impl Operator {
    /// Operators in scan order. Two-character operators come first so that
    /// `>=` is never misread as `>` followed by a stray `=`.
    pub const SCAN_ORDER: [Self; 6] = [
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::NotEqual,
        Self::Greater,
        Self::Less,
        Self::Equal,
    ];

    /// The operator's source text.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equal => "=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed `sensor operator literal` comparison.
///
/// Sensor names are matched case-insensitively; the literal keeps the
/// user's original casing (string comparisons are case-insensitive anyway,
/// but the text is preserved for display and diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpr {
    pub sensor: String,
    pub op: Operator,
    pub literal: String,
}

impl ConditionExpr {
    /// Parse a bare comparison such as `TEMP >= 21.5`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainReason::MissingOperator`] when no comparison operator
    /// is found after a sensor name.
    pub fn parse(text: &str) -> Result<Self, ChainReason> {
        let trimmed = text.trim();
        for op in Operator::SCAN_ORDER {
            if let Some(pos) = trimmed.find(op.symbol()) {
                // An operator at position zero has no sensor in front of
                // it; try the next operator form.
                if pos == 0 {
                    continue;
                }
                let sensor = trimmed[..pos].trim().to_string();
                let literal = trimmed[pos + op.symbol().len()..].trim().to_string();
                return Ok(Self {
                    sensor,
                    op,
                    literal,
                });
            }
        }
        Err(ChainReason::MissingOperator)
    }

    /// Evaluate against a snapshot. Fail-closed: unknown sensors,
    /// unavailable readings, and meaningless operator/sensor pairings all
    /// yield `false`, never an error.
    #[must_use]
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> bool {
        let sensor = self.sensor.trim().to_ascii_uppercase();
        match sensor.as_str() {
            "TEMP" => snapshot
                .temperature
                .is_some_and(|current| self.compare_numeric(current)),
            "LIGHT" => snapshot
                .light_level
                .is_some_and(|current| self.compare_numeric(current)),
            // Any-of-N: true when any valid tracked object satisfies the
            // comparison, not a single aggregate value.
            "DISTANCE" => snapshot
                .ranging
                .iter()
                .take(MAX_RANGING_OBJECTS)
                .filter(|object| object.valid)
                .any(|object| self.compare_numeric(object.distance_cm)),
            "MOTION" => snapshot
                .motion
                .is_some_and(|detected| self.compare_text(if detected { "DETECTED" } else { "NONE" })),
            "TIME" => snapshot
                .local_hour
                .is_some_and(|hour| self.compare_text(TimeOfDay::from_hour(hour).as_str())),
            _ => false,
        }
    }

    fn compare_numeric(&self, current: f32) -> bool {
        let target: f32 = self.literal.trim().parse().unwrap_or(0.0);
        match self.op {
            Operator::Greater => current > target,
            Operator::Less => current < target,
            Operator::GreaterOrEqual => current >= target,
            Operator::LessOrEqual => current <= target,
            Operator::Equal => (current - target).abs() < NUMERIC_EPSILON,
            Operator::NotEqual => (current - target).abs() >= NUMERIC_EPSILON,
        }
    }

    /// Non-numeric sensors only support equality; ordering operators are
    /// meaningless and evaluate to `false`.
    fn compare_text(&self, current: &str) -> bool {
        let target = self.literal.trim();
        match self.op {
            Operator::Equal => current.eq_ignore_ascii_case(target),
            Operator::NotEqual => !current.eq_ignore_ascii_case(target),
            _ => false,
        }
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.sensor, self.op, self.literal)
    }
}
