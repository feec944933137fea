//! Game rule errors.

use super::card::Team;
use super::clue::ClueViolation;
use thiserror::Error;

/// Errors raised by the pure game transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// Not enough words to deal a board
    #[error("Need at least {needed} words to deal a board, got {found}")]
    InvalidInput { needed: usize, found: usize },

    /// Word list handed to start or reset is unusable
    #[error("Invalid word list: {0}")]
    InvalidWordList(String),

    /// Clue refused, with every violation found
    #[error("Invalid clue: {}", format_violations(.0))]
    InvalidClue(Vec<ClueViolation>),

    #[error("Card index {index} is out of range for a board of {len}")]
    CardOutOfRange { index: usize, len: usize },

    #[error("Game is over; reset to play again")]
    GameOver,

    #[error("It is {expected}'s turn, not {found}'s")]
    OutOfTurn { expected: Team, found: Team },

    /// A clue is already on the table for this turn
    #[error("A clue is already active; guess or end the turn first")]
    ClueActive,
}

fn format_violations(violations: &[ClueViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
