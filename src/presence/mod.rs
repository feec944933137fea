//! Presence synchronization.
//!
//! Tracks which players are online in a room from a live membership feed,
//! and merges the durable team and role of each player into that view.
//! Presence is never authoritative for gameplay.

pub mod error;
mod event;
mod feed;
mod synchronizer;
mod tasks;

pub use error::PresenceError;
pub use event::{PresenceEvent, PresenceMeta, PresenceState};
pub use feed::{InMemoryMembershipFeed, MembershipFeed, PresenceChannel, PresenceSubscription};
pub use synchronizer::{LocalPlayer, PresenceSnapshot, PresenceSynchronizer, RosterEntry};
pub use tasks::{
    resync, spawn_heartbeat, spawn_named_task, spawn_presence_listener, subscribe_with_timeout,
};
