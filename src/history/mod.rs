//! Room history log.
//!
//! Clue and guess actions are validated, then appended to the room's audit
//! trail. The trail is append-only; the only removal is the bulk clear that
//! comes with a game reset.

pub mod error;
mod log;
mod writer;

pub use error::{ActionViolation, HistoryError};
pub use log::{HistoryAction, HistoryLog, HistoryRecord};
pub use writer::{validate_action, HistoryWriter};
