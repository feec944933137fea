//! Codenames core: the rules engine and room synchronization of a team
//! word-guessing game.
//!
//! The crate follows a "pure core, imperative shell" split. The game rules
//! are pure functions over an immutable [`GameState`](core::GameState);
//! sessions commit their results against a shared store and merge presence
//! from a live membership feed.
//!
//! # Modules
//!
//! - [`core`]: cards, clues, game state, players and room identity
//! - [`game`]: the state machine transitions
//! - [`history`]: the validated, append-only action log
//! - [`presence`]: who is online, with which team and role
//! - [`store`]: the persistence seam and an in-memory store
//! - [`session`]: the per-room coordinator
//!
//! # Example
//!
//! ```rust
//! use codenames_core::core::{ClueNumber, Team};
//! use codenames_core::game;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let words: Vec<String> = (0..25).map(|i| format!("word{i}")).collect();
//! let mut rng = StdRng::seed_from_u64(1);
//!
//! let state = game::start_game(&words, &words, &mut rng).unwrap();
//! assert_eq!(state.current_turn, Team::Blue);
//!
//! let state = game::give_clue(&state, Team::Blue, "ocean", ClueNumber::Count(2)).unwrap();
//! assert!(state.can_guess);
//!
//! let state = game::end_turn(&state);
//! assert_eq!(state.current_turn, Team::Red);
//! assert!(state.current_clue.is_none());
//! ```

pub mod core;
pub mod game;
pub mod history;
pub mod presence;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use core::{Card, CardColor, ClueNumber, GameError, GamePhase, GameState, RoomId, Team};
pub use session::{RoomSession, SessionConfig, SessionError};
pub use store::{InMemoryRoomStore, RoomStore, StoreError};
