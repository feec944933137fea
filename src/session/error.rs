//! Session error types.

use crate::core::{GameError, Team, UsernameError};
use crate::history::HistoryError;
use crate::presence::PresenceError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The room has no game to act on
    #[error("Room {0} has no game in progress")]
    NoGame(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Teams cannot change once a game has started
    #[error("Teams are locked while a game is in progress")]
    TeamsLocked,

    #[error("Team {0} already has an online spymaster")]
    SpymasterTaken(Team),

    /// No clue is active for the guessing team
    #[error("Guessing is closed until a clue is given")]
    GuessingClosed,

    /// The local player has no team yet
    #[error("Pick a team before giving a clue")]
    Unassigned,

    /// The session has already left its room
    #[error("Session is closed")]
    Closed,
}

impl SessionError {
    /// True when the store rejected a write because it lost a version race.
    pub fn is_stale_write(&self) -> bool {
        matches!(self, Self::Store(StoreError::StaleWrite { .. }))
    }
}
