//! Command executor port — dispatches command strings to the outside world.

use std::future::Future;

/// Result of dispatching one command.
///
/// Execution never fails the caller: the scheduler is fire-and-continue, so
/// failures are carried in the outcome and logged, not propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The command text that was dispatched.
    pub command: String,
    /// Whether the collaborator reported success.
    pub success: bool,
    /// The collaborator's textual reply.
    pub output: String,
}

impl CommandOutcome {
    /// Interpret a collaborator's textual reply. A leading `"Error:"` is
    /// the only recognized failure signal in the text protocol; adapters
    /// that speak it derive the structured flag here.
    #[must_use]
    pub fn from_text(command: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        let success = !output.trim_start().starts_with("Error:");
        Self {
            command: command.into(),
            success,
            output,
        }
    }
}

/// Collaborator that executes command strings.
pub trait CommandExecutor {
    /// Execute one command and report the outcome.
    fn execute(&self, command: &str) -> impl Future<Output = CommandOutcome> + Send;
}
