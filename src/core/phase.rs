//! Coarse lifecycle phase of a game.
//!
//! The phase is never stored. It is derived from [`GameState`](super::GameState)
//! so it cannot drift from the fields that define it.

use serde::{Deserialize, Serialize};

/// Where a room's game currently stands.
///
/// ```text
/// AwaitingClue --give_clue--> ClueActive
/// ClueActive --reveal (turn continues)--> ClueActive
/// ClueActive --reveal (turn ends) | end_turn--> AwaitingClue
/// any --reveal assassin | last card of a color--> GameOver
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum GamePhase {
    AwaitingClue,
    ClueActive,
    GameOver,
}

impl GamePhase {
    pub fn name(&self) -> &str {
        match self {
            Self::AwaitingClue => "AwaitingClue",
            Self::ClueActive => "ClueActive",
            Self::GameOver => "GameOver",
        }
    }

    /// Terminal until an explicit reset.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}
