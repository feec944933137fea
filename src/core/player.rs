//! Durable player records.

use super::card::Team;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_USERNAME_LEN: usize = 2;
pub const MAX_USERNAME_LEN: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spymaster,
    Operative,
}

/// A player's persisted record in a room.
///
/// Team and role are owned by the store; `online` here is the durable flag
/// written on join and leave, while live presence comes from the feed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

impl Player {
    /// A freshly joined player with no assignment.
    pub fn joined(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            team: None,
            role: None,
            online: true,
            last_seen: Utc::now(),
        }
    }
}

/// Mutation applied to a room's player records.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PlayerPatch {
    /// Insert or refresh a record. An existing team and role are kept.
    Upsert(Player),
    Assign {
        username: String,
        team: Option<Team>,
        role: Option<Role>,
    },
    SetOnline {
        username: String,
        online: bool,
    },
    Remove {
        username: String,
    },
    /// Clear every team and role in the room.
    ClearAssignments,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username cannot be empty")]
    Empty,

    #[error(
        "Username must be {min}-{max} characters of letters, numbers, underscores and hyphens",
        min = MIN_USERNAME_LEN,
        max = MAX_USERNAME_LEN
    )]
    Malformed,
}

/// Accept 2 to 20 characters drawn from letters, digits, `_` and `-`.
pub fn validate_username(username: &str) -> Result<(), UsernameError> {
    if username.trim().is_empty() {
        return Err(UsernameError::Empty);
    }
    let len = username.chars().count();
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) || !charset_ok {
        return Err(UsernameError::Malformed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_usernames() {
        assert!(validate_username("ab").is_ok());
        assert!(validate_username("night_owl-42").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());
    }

    #[test]
    fn rejects_blank_and_malformed_usernames() {
        assert_eq!(validate_username("   "), Err(UsernameError::Empty));
        assert_eq!(validate_username("a"), Err(UsernameError::Malformed));
        assert_eq!(validate_username(&"a".repeat(21)), Err(UsernameError::Malformed));
        assert_eq!(validate_username("bad name"), Err(UsernameError::Malformed));
        assert_eq!(validate_username("émile"), Err(UsernameError::Malformed));
    }

    #[test]
    fn joined_player_is_unassigned_and_online() {
        let player = Player::joined("fox");
        assert!(player.online);
        assert!(player.team.is_none());
        assert!(player.role.is_none());
    }
}
