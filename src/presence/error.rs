//! Presence error types.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PresenceError {
    /// The subscribe handshake did not complete in time
    #[error("Presence subscription timed out after {0:?}")]
    Timeout(Duration),

    /// The membership feed refused an operation or went away
    #[error("Presence channel error: {0}")]
    ChannelError(String),

    #[error("Malformed presence record: {0}")]
    MalformedPresence(String),
}
