//! History error types.

use crate::store::StoreError;
use thiserror::Error;

/// Why an action is refused by the history log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionViolation {
    #[error("Clue text must not be empty")]
    EmptyClue,

    #[error("Clue number {number} is outside 0..=9 and is not unlimited")]
    ClueNumberOutOfRange { number: u8 },

    #[error("Guessed word must not be empty")]
    EmptyWord,

    #[error("Unknown action type '{0}'")]
    UnknownType(String),

    #[error("Malformed action data: {0}")]
    Malformed(String),
}

/// Errors that can occur while recording history
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Action failed validation; nothing was written
    #[error("Invalid action: {}", format_violations(.0))]
    InvalidAction(Vec<ActionViolation>),

    /// The store refused the append
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_violations(violations: &[ActionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
