//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `#[from]`. No `String`-typed errors cross a port boundary; the
//! command surface renders these into short status strings at the edge.

use crate::condition::ChainError;

/// Top-level error for everything crossing a port boundary.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("automation name must not be empty")]
    EmptyName,

    #[error("automation must have at least one command")]
    NoCommands,

    #[error("time must be HH:MM (00-23:00-59)")]
    BadTime,

    #[error("{0} must be a positive number of milliseconds")]
    BadMillis(&'static str),

    #[error("invalid condition: {0}")]
    Condition(#[from] ChainError),

    #[error("invalid command '{0}'")]
    BadCommand(String),
}

/// A lookup that came up empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failures of the durable store.
///
/// Deserialize failures never surface here — a malformed store reads as
/// empty. Only genuine IO failures are reported.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read automation store")]
    Read(#[source] std::io::Error),

    #[error("failed to write automation store")]
    Write(#[source] std::io::Error),

    #[error("automation store is malformed")]
    Malformed,
}
