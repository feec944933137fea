//! In-process room store.
//!
//! Game documents are held as `serde_json::Value`, so every write and read
//! passes through the same encoding a remote document store would see.

use super::{PlayerSubscription, RoomStore, StateSubscription, StoreError};
use crate::core::{GameState, Player, PlayerPatch, RoomId};
use crate::game::ResetPlan;
use crate::history::{HistoryLog, HistoryRecord};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

const LOG_TARGET: &str = "codenames_core::store::memory";
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

struct RoomDoc {
    game_state: Option<Value>,
    version: u64,
    history: HistoryLog,
    players: BTreeMap<String, Player>,
    state_tx: broadcast::Sender<GameState>,
    players_tx: broadcast::Sender<Vec<Player>>,
}

impl RoomDoc {
    fn new(capacity: usize) -> Self {
        let (state_tx, _) = broadcast::channel(capacity);
        let (players_tx, _) = broadcast::channel(capacity);
        Self {
            game_state: None,
            version: 0,
            history: HistoryLog::new(),
            players: BTreeMap::new(),
            state_tx,
            players_tx,
        }
    }

    fn check_version(&self, expected: u64) -> Result<(), StoreError> {
        if self.version != expected {
            return Err(StoreError::StaleWrite {
                expected,
                found: self.version,
            });
        }
        Ok(())
    }

    /// Encode, store and decode back, returning the authoritative copy.
    fn put_state(&mut self, mut state: GameState) -> Result<GameState, StoreError> {
        state.version = self.version + 1;
        let value =
            serde_json::to_value(&state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let stored: GameState = serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.game_state = Some(value);
        self.version = stored.version;
        Ok(stored)
    }

    fn player_list(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    fn notify_state(&self, state: &GameState) {
        let _ = self.state_tx.send(state.clone());
    }

    fn notify_players(&self) {
        let _ = self.players_tx.send(self.player_list());
    }
}

/// Room store kept in memory, with failure injection for tests.
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, RoomDoc>>,
    capacity: usize,
    failing_state_writes: AtomicUsize,
    failing_history_appends: AtomicUsize,
    failing_player_updates: AtomicUsize,
}

impl Default for InMemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Store whose change feeds buffer `capacity` notifications per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
            failing_state_writes: AtomicUsize::new(0),
            failing_history_appends: AtomicUsize::new(0),
            failing_player_updates: AtomicUsize::new(0),
        }
    }

    /// Reject the next `n` game document writes, resets included.
    pub fn fail_next_state_writes(&self, n: usize) {
        self.failing_state_writes.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_history_appends(&self, n: usize) {
        self.failing_history_appends.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_player_updates(&self, n: usize) {
        self.failing_player_updates.store(n, Ordering::SeqCst);
    }

    /// The stored JSON document of a room's game, as persisted.
    pub fn raw_document(&self, room_id: &RoomId) -> Option<Value> {
        self.rooms
            .read()
            .get(room_id)
            .and_then(|doc| doc.game_state.clone())
    }

    fn injected_failure(counter: &AtomicUsize, what: &str) -> Result<(), StoreError> {
        let fail = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::WriteError(format!("{what} rejected by store")));
        }
        Ok(())
    }

    fn with_room<T>(
        &self,
        room_id: &RoomId,
        f: impl FnOnce(&mut RoomDoc) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut rooms = self.rooms.write();
        let doc = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::NotFound(format!("room {room_id}")))?;
        f(doc)
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn ensure_room(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(room_id) {
            return Ok(false);
        }
        rooms.insert(room_id.clone(), RoomDoc::new(self.capacity));
        debug!(target: LOG_TARGET, room = %room_id, "room created");
        Ok(true)
    }

    async fn read_room_state(&self, room_id: &RoomId) -> Result<GameState, StoreError> {
        let rooms = self.rooms.read();
        let doc = rooms
            .get(room_id)
            .ok_or_else(|| StoreError::NotFound(format!("room {room_id}")))?;
        let value = doc
            .game_state
            .clone()
            .ok_or_else(|| StoreError::NotFound(format!("game state of room {room_id}")))?;
        serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn write_room_state(
        &self,
        room_id: &RoomId,
        state: GameState,
        expected_version: u64,
    ) -> Result<GameState, StoreError> {
        self.with_room(room_id, |doc| {
            doc.check_version(expected_version)?;
            Self::injected_failure(&self.failing_state_writes, "game state write")?;
            let stored = doc.put_state(state)?;
            doc.notify_state(&stored);
            debug!(target: LOG_TARGET, room = %room_id, version = stored.version, "game state written");
            Ok(stored)
        })
    }

    async fn commit_reset(
        &self,
        room_id: &RoomId,
        plan: ResetPlan,
        expected_version: u64,
    ) -> Result<GameState, StoreError> {
        self.with_room(room_id, |doc| {
            doc.check_version(expected_version)?;
            Self::injected_failure(&self.failing_state_writes, "reset")?;
            let stored = doc.put_state(plan.state)?;
            if plan.clear_history {
                doc.history = HistoryLog::new();
            }
            if plan.clear_player_assignments {
                for player in doc.players.values_mut() {
                    player.team = None;
                    player.role = None;
                }
            }
            doc.notify_state(&stored);
            if plan.clear_player_assignments {
                doc.notify_players();
            }
            debug!(target: LOG_TARGET, room = %room_id, version = stored.version, "room reset");
            Ok(stored)
        })
    }

    async fn subscribe_room_state(
        &self,
        room_id: &RoomId,
    ) -> Result<StateSubscription, StoreError> {
        self.with_room(room_id, |doc| Ok(doc.state_tx.subscribe()))
    }

    async fn append_history(
        &self,
        room_id: &RoomId,
        record: HistoryRecord,
    ) -> Result<(), StoreError> {
        self.with_room(room_id, |doc| {
            Self::injected_failure(&self.failing_history_appends, "history append")?;
            doc.history = doc.history.record(record);
            Ok(())
        })
    }

    async fn read_history(&self, room_id: &RoomId) -> Result<HistoryLog, StoreError> {
        self.with_room(room_id, |doc| Ok(doc.history.clone()))
    }

    async fn read_players(&self, room_id: &RoomId) -> Result<Vec<Player>, StoreError> {
        self.with_room(room_id, |doc| Ok(doc.player_list()))
    }

    async fn update_players(
        &self,
        room_id: &RoomId,
        patch: PlayerPatch,
    ) -> Result<(), StoreError> {
        self.with_room(room_id, |doc| {
            Self::injected_failure(&self.failing_player_updates, "player update")?;
            let missing = |username: &str| {
                StoreError::NotFound(format!("player {username} in room {room_id}"))
            };

            match patch {
                PlayerPatch::Upsert(player) => {
                    doc.players
                        .entry(player.username.clone())
                        .and_modify(|existing| {
                            existing.online = player.online;
                            existing.last_seen = player.last_seen;
                        })
                        .or_insert(player);
                }
                PlayerPatch::Assign {
                    username,
                    team,
                    role,
                } => {
                    let player = doc
                        .players
                        .get_mut(&username)
                        .ok_or_else(|| missing(&username))?;
                    player.team = team;
                    player.role = role;
                }
                PlayerPatch::SetOnline { username, online } => {
                    let player = doc
                        .players
                        .get_mut(&username)
                        .ok_or_else(|| missing(&username))?;
                    player.online = online;
                    player.last_seen = Utc::now();
                }
                PlayerPatch::Remove { username } => {
                    doc.players.remove(&username);
                }
                PlayerPatch::ClearAssignments => {
                    for player in doc.players.values_mut() {
                        player.team = None;
                        player.role = None;
                    }
                }
            }

            doc.notify_players();
            Ok(())
        })
    }

    async fn subscribe_players(
        &self,
        room_id: &RoomId,
    ) -> Result<PlayerSubscription, StoreError> {
        self.with_room(room_id, |doc| Ok(doc.players_tx.subscribe()))
    }
}
