//! Persistence seam.
//!
//! The store is an opaque keyed document store. The crate only needs read,
//! conditional write and subscribe primitives, expressed by [`RoomStore`],
//! and is handed an implementation explicitly so tests can substitute their
//! own.

pub mod error;
mod memory;

pub use error::StoreError;
pub use memory::InMemoryRoomStore;

use crate::core::{GameState, Player, PlayerPatch, RoomId};
use crate::game::ResetPlan;
use crate::history::{HistoryLog, HistoryRecord};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Change feed of a room's game document, one authoritative copy per write.
pub type StateSubscription = broadcast::Receiver<GameState>;

/// Change feed of a room's player records, the full list after each change.
pub type PlayerSubscription = broadcast::Receiver<Vec<Player>>;

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create the room document if missing. Returns true when it was created.
    async fn ensure_room(&self, room_id: &RoomId) -> Result<bool, StoreError>;

    /// Current game document. `NotFound` if the room or its game is missing.
    async fn read_room_state(&self, room_id: &RoomId) -> Result<GameState, StoreError>;

    /// Write `state` if the stored version still equals `expected_version`.
    ///
    /// A room without a game is at version 0. On success the stored copy,
    /// carrying its new version, is returned and broadcast to subscribers.
    async fn write_room_state(
        &self,
        room_id: &RoomId,
        state: GameState,
        expected_version: u64,
    ) -> Result<GameState, StoreError>;

    /// Apply a reset as one atomic change: replace the game document, and
    /// clear history and player assignments as the plan requests.
    async fn commit_reset(
        &self,
        room_id: &RoomId,
        plan: ResetPlan,
        expected_version: u64,
    ) -> Result<GameState, StoreError>;

    async fn subscribe_room_state(&self, room_id: &RoomId)
        -> Result<StateSubscription, StoreError>;

    async fn append_history(&self, room_id: &RoomId, record: HistoryRecord)
        -> Result<(), StoreError>;

    async fn read_history(&self, room_id: &RoomId) -> Result<HistoryLog, StoreError>;

    async fn read_players(&self, room_id: &RoomId) -> Result<Vec<Player>, StoreError>;

    async fn update_players(&self, room_id: &RoomId, patch: PlayerPatch)
        -> Result<(), StoreError>;

    async fn subscribe_players(&self, room_id: &RoomId)
        -> Result<PlayerSubscription, StoreError>;
}
