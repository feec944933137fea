//! Game state machine.
//!
//! Pure transitions over [`GameState`](crate::core::GameState): start, clue,
//! reveal, end turn and reset. Validation happens here, persistence does not.

mod transitions;

pub use transitions::{end_turn, give_clue, reset_game, reveal_card, start_game, ResetPlan};
