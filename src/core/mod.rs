//! Core game data model.
//!
//! This module contains the pure data of a room:
//! - Cards, teams and the deck generator
//! - Clues and guess budgets, with their wire encoding
//! - The per-room game state document and its derived phase
//! - Durable player records and room identity
//!
//! Nothing in this module performs I/O.

mod card;
mod clue;
pub mod deck;
mod error;
mod phase;
mod player;
mod room;
mod state;

pub use card::{Card, CardColor, Team};
pub use clue::{
    validate_clue, Clue, ClueNumber, ClueType, ClueViolation, GuessBudget, MAX_CLUE_COUNT,
    UNLIMITED_TOKEN,
};
pub use deck::{clean_words, draw_words, generate_deck, parse_word_list, BOARD_SIZE, COLOR_DISTRIBUTION};
pub use error::GameError;
pub use phase::GamePhase;
pub use player::{validate_username, Player, PlayerPatch, Role, UsernameError};
pub use room::RoomId;
pub use state::{GameState, BLUE_CARDS, RED_CARDS};

use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Turn an accumulated validation into a plain result.
pub(crate) fn collect_violations<E: Clone>(
    validation: Validation<(), NonEmptyVec<E>>,
) -> Result<(), Vec<E>> {
    match validation {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
    }
}
