//! Room session coordination.
//!
//! A [`RoomSession`] runs the pure game transitions against an injected
//! [`RoomStore`](crate::store::RoomStore) and keeps a local view that is
//! only ever updated from committed or notified state.

mod config;
mod coordinator;
pub mod error;

pub use config::SessionConfig;
pub use coordinator::RoomSession;
pub use error::SessionError;
