//! The `IF` / `ELSE IF` / `ELSE` condition language.
//!
//! Grammar:
//!
//! ```text
//! chain  := branch (branch)*
//! branch := "IF" cond "THEN" action
//!         | "ELSE IF" cond "THEN" action
//!         | "ELSE" action
//! cond   := sensor operator literal
//! ```
//!
//! Keywords are matched case-insensitively on an upper-cased copy of the
//! input, but condition and action text are re-sliced from the original
//! string so literals and action commands keep the user's casing.
//!
//! [`ConditionChain::parse`] is the single validator for the language: it
//! either yields an evaluable chain or a structured [`ChainError`] naming
//! the offending branch, and is shared by the validate-only and apply
//! paths.

mod expr;

pub use expr::{ConditionExpr, NUMERIC_EPSILON, Operator};

use crate::sensor::SensorSnapshot;

/// Branch keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
}

/// One parsed branch of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    /// `None` only for the terminal `ELSE` branch.
    pub expr: Option<ConditionExpr>,
    /// Trimmed action text, original casing preserved.
    pub action: String,
}

/// Structured diagnostic for a malformed chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("branch {branch}: {reason}")]
pub struct ChainError {
    /// Zero-based index of the branch the problem was detected in.
    pub branch: usize,
    pub reason: ChainReason,
}

/// Why a chain failed to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChainReason {
    #[error("chain must start with 'IF'")]
    MissingLeadingIf,
    #[error("'IF' can only open a chain")]
    IfNotFirst,
    #[error("'ELSE IF' cannot follow 'ELSE'")]
    ElseIfAfterElse,
    #[error("multiple 'ELSE' branches are not allowed")]
    DuplicateElse,
    #[error("missing 'THEN' keyword")]
    MissingThen,
    #[error("missing condition before 'THEN'")]
    EmptyCondition,
    #[error("condition has no comparison operator")]
    MissingOperator,
    #[error("missing action")]
    EmptyAction,
}

/// A validated `IF` / `ELSE IF` / `ELSE` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionChain {
    branches: Vec<Branch>,
}

impl ConditionChain {
    /// Parse and validate a chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] locating the first structural problem:
    /// a chain not opening with `IF`, an `IF` anywhere but the front,
    /// `ELSE IF` or a second `ELSE` after the terminal `ELSE`, a missing
    /// `THEN`, an empty condition or action, or a condition without a
    /// comparison operator.
    pub fn parse(input: &str) -> Result<Self, ChainError> {
        let upper = input.to_ascii_uppercase();
        let len = input.len();
        let start = len - input.trim_start().len();

        if !upper[start..].starts_with("IF ") {
            return Err(ChainError {
                branch: 0,
                reason: ChainReason::MissingLeadingIf,
            });
        }

        let mut branches = Vec::new();
        let mut pos = start;
        while pos < len {
            while pos < len && upper.as_bytes()[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos >= len {
                break;
            }
            let rest = &upper[pos..];
            if rest.starts_with("ELSE IF ") {
                let (expr, action, next) =
                    Self::parse_guarded(input, &upper, pos + 8, branches.len())?;
                branches.push(Branch {
                    kind: BranchKind::ElseIf,
                    expr: Some(expr),
                    action,
                });
                pos = next;
            } else if rest.starts_with("ELSE ") {
                let branch = branches.len();
                let region = pos + 5;
                // ELSE is terminal: anything chained after it is an error.
                if let Some(rel) = upper[region..].find(" ELSE ") {
                    let reason = if upper[region + rel + 1..].starts_with("ELSE IF ") {
                        ChainReason::ElseIfAfterElse
                    } else {
                        ChainReason::DuplicateElse
                    };
                    return Err(ChainError { branch, reason });
                }
                if upper[region..].contains("IF ") {
                    return Err(ChainError {
                        branch,
                        reason: ChainReason::IfNotFirst,
                    });
                }
                let action = input[region..].trim();
                if action.is_empty() {
                    return Err(ChainError {
                        branch,
                        reason: ChainReason::EmptyAction,
                    });
                }
                branches.push(Branch {
                    kind: BranchKind::Else,
                    expr: None,
                    action: action.to_string(),
                });
                pos = len;
            } else if rest.starts_with("IF ") {
                if pos != start {
                    return Err(ChainError {
                        branch: branches.len(),
                        reason: ChainReason::IfNotFirst,
                    });
                }
                let (expr, action, next) = Self::parse_guarded(input, &upper, pos + 3, 0)?;
                branches.push(Branch {
                    kind: BranchKind::If,
                    expr: Some(expr),
                    action,
                });
                pos = next;
            } else {
                pos += 1;
            }
        }

        Ok(Self { branches })
    }

    /// Parse the `cond THEN action` tail of an `IF` / `ELSE IF` branch.
    /// Returns the expression, the trimmed original-case action, and the
    /// offset where the next branch keyword may begin.
    fn parse_guarded(
        original: &str,
        upper: &str,
        cond_start: usize,
        branch: usize,
    ) -> Result<(ConditionExpr, String, usize), ChainError> {
        let then_rel = upper[cond_start..].find(" THEN ").ok_or(ChainError {
            branch,
            reason: ChainReason::MissingThen,
        })?;
        let cond_end = cond_start + then_rel;
        let cond_text = original[cond_start..cond_end].trim();
        if cond_text.is_empty() {
            return Err(ChainError {
                branch,
                reason: ChainReason::EmptyCondition,
            });
        }
        let expr =
            ConditionExpr::parse(cond_text).map_err(|reason| ChainError { branch, reason })?;

        let action_start = cond_end + " THEN ".len();
        let action_end = upper[action_start..]
            .find(" ELSE ")
            .map_or(upper.len(), |rel| action_start + rel);
        if upper[action_start..action_end].contains("IF ") {
            return Err(ChainError {
                branch,
                reason: ChainReason::IfNotFirst,
            });
        }
        let action = original[action_start..action_end].trim();
        if action.is_empty() {
            return Err(ChainError {
                branch,
                reason: ChainReason::EmptyAction,
            });
        }
        Ok((expr, action.to_string(), action_end))
    }

    /// The validated branches, in source order.
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Walk branches in order and return the action of the first branch
    /// whose condition holds (or of an unconditional `ELSE`). `None` when
    /// no branch selects.
    #[must_use]
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> Option<String> {
        for branch in &self.branches {
            match &branch.expr {
                Some(expr) if expr.evaluate(snapshot) => return Some(branch.action.clone()),
                Some(_) => {}
                None => return Some(branch.action.clone()),
            }
        }
        None
    }
}

/// Evaluate an automation's gate condition text.
///
/// Accepts either a bare `sensor operator literal` expression or a full
/// chain; a chain passes when any branch selects an action. Empty text
/// means "no gate" and passes; malformed text fails closed.
#[must_use]
pub fn gate_passes(text: &str, snapshot: &SensorSnapshot) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.to_ascii_uppercase().starts_with("IF ") {
        ConditionChain::parse(trimmed)
            .map(|chain| chain.evaluate(snapshot).is_some())
            .unwrap_or(false)
    } else {
        ConditionExpr::parse(trimmed)
            .map(|expr| expr.evaluate(snapshot))
            .unwrap_or(false)
    }
}
