//! Per-room session: the imperative shell around the pure game rules.
//!
//! Every mutation follows the same cycle. Inputs are validated without
//! touching the store, then the session reads the authoritative state,
//! applies a pure transition and writes it back conditioned on the version
//! it read. A lost race (`StaleWrite`) is retried against fresh state. The
//! local view only changes after the store accepted the write, or when the
//! store notifies a change.

use super::config::SessionConfig;
use super::error::SessionError;
use crate::core::{
    collect_violations, validate_clue, validate_username, ClueNumber, GameError, GameState,
    Player, PlayerPatch, Role, RoomId, Team, BOARD_SIZE,
};
use crate::game::{self, ResetPlan};
use crate::history::{HistoryAction, HistoryRecord, HistoryWriter};
use crate::presence::{
    resync, spawn_heartbeat, spawn_named_task, spawn_presence_listener, subscribe_with_timeout,
    LocalPlayer, MembershipFeed, PresenceChannel, PresenceMeta, PresenceSnapshot,
    PresenceSynchronizer,
};
use crate::store::{PlayerSubscription, RoomStore, StateSubscription, StoreError};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "codenames_core::session";

/// What a transition asks the commit loop to do.
enum Mutation {
    Write(GameState),
    Reset(ResetPlan),
    /// Nothing to write; the state read is already the answer.
    Unchanged(GameState),
}

struct Committed {
    before: Option<GameState>,
    after: GameState,
    written: bool,
}

/// A player's live connection to one room.
///
/// Owns the store subscriptions, the presence listener and the heartbeat.
/// All of them stop on [`RoomSession::leave`] or when the session is dropped.
pub struct RoomSession {
    room_id: RoomId,
    username: String,
    store: Arc<dyn RoomStore>,
    feed: Arc<dyn MembershipFeed>,
    history: HistoryWriter,
    config: SessionConfig,
    presence: Arc<RwLock<PresenceSynchronizer>>,
    channel: Arc<Mutex<Option<Arc<dyn PresenceChannel>>>>,
    view: Arc<watch::Sender<Option<GameState>>>,
    rng: Mutex<StdRng>,
    token: CancellationToken,
    presence_token: Mutex<CancellationToken>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl RoomSession {
    /// Join `room_id` as `username`.
    ///
    /// Creates the room when missing, registers the player (keeping any team
    /// and role already stored for them), loads the current game and joins
    /// the presence channel. Fails with `PresenceError::Timeout` when the
    /// presence handshake does not complete within the configured bound; the
    /// player registration is rolled back first.
    pub async fn join(
        store: Arc<dyn RoomStore>,
        feed: Arc<dyn MembershipFeed>,
        room_id: impl Into<RoomId>,
        username: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let room_id = room_id.into();
        let username = username.into();
        validate_username(&username)?;

        if store.ensure_room(&room_id).await? {
            info!(target: LOG_TARGET, room = %room_id, "room created");
        }
        let known = store
            .read_players(&room_id)
            .await?
            .iter()
            .any(|player| player.username == username);
        store
            .update_players(&room_id, PlayerPatch::Upsert(Player::joined(username.clone())))
            .await?;

        let state_rx = store.subscribe_room_state(&room_id).await?;
        let players_rx = store.subscribe_players(&room_id).await?;

        let mut presence = PresenceSynchronizer::new(username.clone());
        presence.merge_players(&store.read_players(&room_id).await?);
        let initial = read_optional(store.as_ref(), &room_id).await?;

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (view, _) = watch::channel(initial);

        let session = Self {
            history: HistoryWriter::new(store.clone()),
            room_id,
            username,
            store,
            feed,
            config,
            presence: Arc::new(RwLock::new(presence)),
            channel: Arc::new(Mutex::new(None)),
            view: Arc::new(view),
            rng: Mutex::new(rng),
            token: CancellationToken::new(),
            presence_token: Mutex::new(CancellationToken::new()),
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };

        session.spawn_state_listener(state_rx);
        session.spawn_players_listener(players_rx);
        if let Err(err) = session.connect_presence().await {
            session.abandon_join(known).await;
            return Err(err);
        }

        info!(target: LOG_TARGET, room = %session.room_id, user = %session.username, "joined room");
        Ok(session)
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Last committed or notified game state. `None` until a game exists.
    pub fn view(&self) -> Option<GameState> {
        self.view.borrow().clone()
    }

    /// Receiver notified on every change of the local view.
    pub fn subscribe(&self) -> watch::Receiver<Option<GameState>> {
        self.view.subscribe()
    }

    pub fn presence(&self) -> PresenceSnapshot {
        self.presence.read().snapshot()
    }

    pub fn local_player(&self) -> LocalPlayer {
        self.presence.read().local().clone()
    }

    /// Up to `limit` history records, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryRecord>, SessionError> {
        let log = self.store.read_history(&self.room_id).await?;
        Ok(log.recent(limit).into_iter().cloned().collect())
    }

    /// One page of history, sized by the session config.
    pub async fn recent_history(&self) -> Result<Vec<HistoryRecord>, SessionError> {
        self.history(self.config.history_page_size).await
    }

    /// Deal a new game and make it the room's state.
    pub async fn start_game(
        &self,
        words: &[String],
        full_word_list: &[String],
    ) -> Result<GameState, SessionError> {
        self.ensure_open()?;
        let fresh = game::start_game(words, full_word_list, &mut *self.rng.lock())?;

        let committed = self
            .commit("start_game", |_| Ok(Mutation::Write(fresh.clone())))
            .await?;
        info!(target: LOG_TARGET, room = %self.room_id, user = %self.username, version = committed.after.version, "game started");
        Ok(committed.after)
    }

    /// Give a clue for the local player's team.
    pub async fn give_clue(&self, text: &str, number: ClueNumber) -> Result<GameState, SessionError> {
        self.ensure_open()?;
        collect_violations(validate_clue(text, number)).map_err(GameError::InvalidClue)?;
        let team = self.local_player().team.ok_or(SessionError::Unassigned)?;

        let committed = self
            .commit("give_clue", |current| {
                let state = self.require_game(current)?;
                Ok(Mutation::Write(game::give_clue(state, team, text, number)?))
            })
            .await?;

        self.append_history(HistoryAction::Clue {
            team,
            clue: text.trim().to_string(),
            number,
        })
        .await;
        Ok(committed.after)
    }

    /// Reveal the card at `index` for the team on turn.
    ///
    /// Revealing is only open while a clue is active. Revealing a revealed
    /// card, or any card of a finished game, changes nothing.
    pub async fn reveal_card(&self, index: usize) -> Result<GameState, SessionError> {
        self.ensure_open()?;
        if index >= BOARD_SIZE {
            return Err(GameError::CardOutOfRange {
                index,
                len: BOARD_SIZE,
            }
            .into());
        }

        let committed = self
            .commit("reveal_card", |current| {
                let state = self.require_game(current)?;
                if !state.game_over && !state.can_guess {
                    return Err(SessionError::GuessingClosed);
                }
                let next = game::reveal_card(state, index)?;
                if next == *state {
                    return Ok(Mutation::Unchanged(next));
                }
                Ok(Mutation::Write(next))
            })
            .await?;

        if committed.written {
            if let Some(action) = committed
                .before
                .as_ref()
                .and_then(|before| guess_action(before, index))
            {
                self.append_history(action).await;
            }
        }
        if committed.after.game_over {
            info!(target: LOG_TARGET, room = %self.room_id, winner = ?committed.after.winner, "game over");
        }
        Ok(committed.after)
    }

    pub async fn end_turn(&self) -> Result<GameState, SessionError> {
        self.ensure_open()?;
        let committed = self
            .commit("end_turn", |current| {
                let state = self.require_game(current)?;
                if state.game_over {
                    return Ok(Mutation::Unchanged(state.clone()));
                }
                Ok(Mutation::Write(game::end_turn(state)))
            })
            .await?;
        Ok(committed.after)
    }

    /// Deal a new board from the retained word pool, clearing history and
    /// every player's team and role in the same store change.
    pub async fn reset_game(&self) -> Result<GameState, SessionError> {
        self.ensure_open()?;
        let committed = self
            .commit("reset_game", |current| {
                let state = self.require_game(current)?;
                let plan = game::reset_game(state, &mut *self.rng.lock())?;
                Ok(Mutation::Reset(plan))
            })
            .await?;

        let meta = {
            let mut presence = self.presence.write();
            presence.clear_assignments();
            presence.local_meta()
        };
        self.retrack(meta).await;
        info!(target: LOG_TARGET, room = %self.room_id, user = %self.username, version = committed.after.version, "game reset");
        Ok(committed.after)
    }

    /// Pick a team and role for the local player.
    ///
    /// Refused while a game is in progress or when another online player is
    /// already the team's spymaster. On failure the local team and role are
    /// realigned with the stored player record.
    pub async fn select_team_and_role(&self, team: Team, role: Role) -> Result<(), SessionError> {
        self.ensure_open()?;
        match self.try_select(team, role).await {
            Ok(()) => {
                info!(target: LOG_TARGET, room = %self.room_id, user = %self.username, team = %team, role = ?role, "team selected");
                Ok(())
            }
            Err(err) => {
                self.restore_assignment().await;
                warn!(target: LOG_TARGET, room = %self.room_id, user = %self.username, error = %err, "team selection refused");
                Err(err)
            }
        }
    }

    /// Re-register with the store and re-join the presence channel.
    ///
    /// The stored team and role survive a reconnect.
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.presence_token.lock().cancel();
        let previous = self.channel.lock().take();
        if let Some(previous) = previous {
            if let Err(err) = previous.unsubscribe().await {
                warn!(target: LOG_TARGET, room = %self.room_id, error = %err, "leaving stale presence channel failed");
            }
        }
        self.presence.write().set_connected(false);

        self.store
            .update_players(
                &self.room_id,
                PlayerPatch::Upsert(Player::joined(self.username.clone())),
            )
            .await?;
        let players = self.store.read_players(&self.room_id).await?;
        self.presence.write().merge_players(&players);
        let state = read_optional(self.store.as_ref(), &self.room_id).await?;
        self.view.send_replace(state);

        self.connect_presence().await?;
        info!(target: LOG_TARGET, room = %self.room_id, user = %self.username, "reconnected");
        Ok(())
    }

    /// Leave the room: stop every task, untrack presence and remove the
    /// player record. A closed session refuses further calls.
    pub async fn leave(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.token.cancel();

        let channel = self.channel.lock().take();
        if let Some(channel) = channel {
            if let Err(err) = channel.unsubscribe().await {
                warn!(target: LOG_TARGET, room = %self.room_id, error = %err, "presence unsubscribe failed");
            }
        }
        self.presence.write().set_connected(false);

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(target: LOG_TARGET, room = %self.room_id, error = %err, "session task ended abnormally");
            }
        }

        self.store
            .update_players(
                &self.room_id,
                PlayerPatch::Remove {
                    username: self.username.clone(),
                },
            )
            .await?;
        info!(target: LOG_TARGET, room = %self.room_id, user = %self.username, "left room");
        Ok(())
    }

    async fn try_select(&self, team: Team, role: Role) -> Result<(), SessionError> {
        let current = read_optional(self.store.as_ref(), &self.room_id).await?;
        if current.as_ref().is_some_and(GameState::in_progress) {
            return Err(SessionError::TeamsLocked);
        }

        if role == Role::Spymaster && self.spymaster_taken(team).await? {
            return Err(SessionError::SpymasterTaken(team));
        }

        self.store
            .update_players(
                &self.room_id,
                PlayerPatch::Assign {
                    username: self.username.clone(),
                    team: Some(team),
                    role: Some(role),
                },
            )
            .await?;

        let meta = {
            let mut presence = self.presence.write();
            presence.assign_local(Some(team), Some(role));
            presence.local_meta()
        };
        self.retrack(meta).await;
        Ok(())
    }

    /// Whether another online player already holds `team`'s spymaster seat.
    ///
    /// Asks the live channel, or the durable records while disconnected.
    async fn spymaster_taken(&self, team: Team) -> Result<bool, SessionError> {
        let channel = self.channel.lock().clone();
        if let Some(channel) = channel {
            let state = channel.presence_state().await?;
            return Ok(state.values().flatten().any(|meta| {
                meta.name != self.username
                    && meta.team == Some(team)
                    && meta.role == Some(Role::Spymaster)
            }));
        }

        let players = self.store.read_players(&self.room_id).await?;
        Ok(players.iter().any(|player| {
            player.username != self.username
                && player.online
                && player.team == Some(team)
                && player.role == Some(Role::Spymaster)
        }))
    }

    async fn restore_assignment(&self) {
        let players = match self.store.read_players(&self.room_id).await {
            Ok(players) => players,
            Err(err) => {
                warn!(target: LOG_TARGET, room = %self.room_id, user = %self.username, error = %err, "player re-read failed; keeping local assignment");
                return;
            }
        };

        let (changed, meta) = {
            let mut presence = self.presence.write();
            let before = (presence.local().team, presence.local().role);
            presence.merge_players(&players);
            let after = (presence.local().team, presence.local().role);
            (before != after, presence.local_meta())
        };
        if changed {
            self.retrack(meta).await;
        }
    }

    /// Undo the registration of a join whose presence handshake failed.
    async fn abandon_join(&self, known: bool) {
        self.token.cancel();
        let patch = if known {
            PlayerPatch::SetOnline {
                username: self.username.clone(),
                online: false,
            }
        } else {
            PlayerPatch::Remove {
                username: self.username.clone(),
            }
        };
        if let Err(err) = self.store.update_players(&self.room_id, patch).await {
            warn!(target: LOG_TARGET, room = %self.room_id, user = %self.username, error = %err, "rolling back player registration failed");
        }
    }

    /// Read, transform and conditionally write, retrying lost races.
    async fn commit<F>(&self, op: &'static str, mut transition: F) -> Result<Committed, SessionError>
    where
        F: FnMut(Option<&GameState>) -> Result<Mutation, SessionError>,
    {
        let attempts = self.config.max_write_attempts.max(1);
        let mut attempt = 1;

        loop {
            let current = read_optional(self.store.as_ref(), &self.room_id).await?;
            let expected = current.as_ref().map_or(0, |state| state.version);

            let result = match transition(current.as_ref())? {
                Mutation::Unchanged(state) => {
                    self.view.send_replace(Some(state.clone()));
                    return Ok(Committed {
                        before: current,
                        after: state,
                        written: false,
                    });
                }
                Mutation::Write(next) => {
                    self.store
                        .write_room_state(&self.room_id, next, expected)
                        .await
                }
                Mutation::Reset(plan) => {
                    self.store
                        .commit_reset(&self.room_id, plan, expected)
                        .await
                }
            };

            match result {
                Ok(stored) => {
                    debug!(target: LOG_TARGET, room = %self.room_id, op, version = stored.version, attempt, "state committed");
                    self.view.send_replace(Some(stored.clone()));
                    return Ok(Committed {
                        before: current,
                        after: stored,
                        written: true,
                    });
                }
                Err(StoreError::StaleWrite { expected, found }) if attempt < attempts => {
                    warn!(target: LOG_TARGET, room = %self.room_id, op, expected, found, attempt, "stale write; retrying");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, room = %self.room_id, op, error = %err, attempt, "commit failed");
                    return Err(err.into());
                }
            }
        }
    }

    fn require_game<'a>(&self, current: Option<&'a GameState>) -> Result<&'a GameState, SessionError> {
        current.ok_or_else(|| SessionError::NoGame(self.room_id.to_string()))
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    async fn append_history(&self, action: HistoryAction) {
        let kind = action.action_type();
        if let Err(err) = self.history.record(&self.room_id, action).await {
            warn!(target: LOG_TARGET, room = %self.room_id, action = kind, error = %err, "history append failed");
        }
    }

    async fn retrack(&self, meta: PresenceMeta) {
        let channel = self.channel.lock().clone();
        if let Some(channel) = channel {
            if let Err(err) = channel.track(&self.username, meta).await {
                warn!(target: LOG_TARGET, room = %self.room_id, user = %self.username, error = %err, "presence track failed");
            }
        }
    }

    async fn connect_presence(&self) -> Result<(), SessionError> {
        let channel = self.feed.join_channel(&self.room_id).await?;
        let events = match subscribe_with_timeout(channel.as_ref(), self.config.subscribe_timeout).await {
            Ok(events) => events,
            Err(err) => {
                self.presence.write().set_connected(false);
                warn!(target: LOG_TARGET, room = %self.room_id, user = %self.username, error = %err, "presence subscribe failed");
                return Err(err.into());
            }
        };

        let meta = self.presence.read().local_meta();
        channel.track(&self.username, meta).await?;
        resync(channel.as_ref(), &self.presence).await?;
        self.presence.write().set_connected(true);

        let token = self.token.child_token();
        let listener = spawn_presence_listener(
            self.room_id.clone(),
            channel.clone(),
            events,
            self.presence.clone(),
            token.clone(),
        );
        let heartbeat = spawn_heartbeat(
            self.room_id.clone(),
            channel.clone(),
            self.presence.clone(),
            self.config.heartbeat_interval,
            token.clone(),
        );
        {
            let mut tasks = self.tasks.lock();
            tasks.retain(|task| !task.is_finished());
            tasks.extend([listener, heartbeat]);
        }
        *self.channel.lock() = Some(channel);
        let previous = std::mem::replace(&mut *self.presence_token.lock(), token);
        previous.cancel();
        Ok(())
    }

    /// Every store notification overwrites the view.
    fn spawn_state_listener(&self, mut rx: StateSubscription) {
        let store = self.store.clone();
        let room_id = self.room_id.clone();
        let view = self.view.clone();
        let token = self.token.clone();

        let handle = spawn_named_task(format!("state-listener:{room_id}"), async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    received = rx.recv() => received,
                };

                match received {
                    Ok(state) => {
                        debug!(target: LOG_TARGET, room = %room_id, version = state.version, "state notification");
                        view.send_replace(Some(state));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: LOG_TARGET, room = %room_id, skipped, "state listener lagged; re-reading");
                        match read_optional(store.as_ref(), &room_id).await {
                            Ok(state) => {
                                view.send_replace(state);
                            }
                            Err(err) => {
                                warn!(target: LOG_TARGET, room = %room_id, error = %err, "state re-read failed")
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Durable player changes from any client update the local assignment.
    fn spawn_players_listener(&self, mut rx: PlayerSubscription) {
        let room_id = self.room_id.clone();
        let username = self.username.clone();
        let presence = self.presence.clone();
        let channel = self.channel.clone();
        let token = self.token.clone();

        let handle = spawn_named_task(format!("players-listener:{room_id}"), async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    received = rx.recv() => received,
                };

                let players = match received {
                    Ok(players) => players,
                    Err(RecvError::Lagged(skipped)) => {
                        // The next notification carries the full list again.
                        debug!(target: LOG_TARGET, room = %room_id, skipped, "players listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let (changed, meta) = {
                    let mut presence = presence.write();
                    let before = (presence.local().team, presence.local().role);
                    presence.merge_players(&players);
                    let after = (presence.local().team, presence.local().role);
                    (before != after, presence.local_meta())
                };
                if !changed {
                    continue;
                }

                debug!(target: LOG_TARGET, room = %room_id, user = %username, team = ?meta.team, role = ?meta.role, "local assignment changed");
                let current = channel.lock().clone();
                if let Some(current) = current {
                    if let Err(err) = current.track(&username, meta).await {
                        warn!(target: LOG_TARGET, room = %room_id, user = %username, error = %err, "presence track failed");
                    }
                }
            }
        });
        self.tasks.lock().push(handle);
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The room's game, or `None` when the room has none yet.
async fn read_optional(
    store: &dyn RoomStore,
    room_id: &RoomId,
) -> Result<Option<GameState>, StoreError> {
    match store.read_room_state(room_id).await {
        Ok(state) => Ok(Some(state)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// History entry for a reveal resolved against the state it was made on.
fn guess_action(before: &GameState, index: usize) -> Option<HistoryAction> {
    let card = before.cards.get(index)?;
    let team = before.current_turn;
    Some(HistoryAction::Guess {
        team,
        word: card.word.clone(),
        correct: card.color.team() == Some(team),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Card, CardColor};
    use crate::presence::InMemoryMembershipFeed;
    use crate::store::InMemoryRoomStore;
    use std::time::Duration;

    fn board() -> GameState {
        let mut cards = Vec::new();
        for i in 0..25 {
            let color = match i {
                0..=7 => CardColor::Red,
                8..=16 => CardColor::Blue,
                24 => CardColor::Assassin,
                _ => CardColor::Neutral,
            };
            cards.push(Card::new(format!("w{i}"), color));
        }
        GameState::new(cards, Vec::new())
    }

    #[test]
    fn guess_on_own_color_is_correct() {
        let state = board();
        assert_eq!(
            guess_action(&state, 8),
            Some(HistoryAction::Guess {
                team: Team::Blue,
                word: "w8".into(),
                correct: true
            })
        );
    }

    #[test]
    fn guess_on_neutral_or_assassin_is_incorrect() {
        let state = board();
        for index in [17, 24, 0] {
            match guess_action(&state, index) {
                Some(HistoryAction::Guess { correct, .. }) => assert!(!correct),
                other => panic!("Expected guess, got {other:?}"),
            }
        }
        assert!(guess_action(&state, 25).is_none());
    }

    #[tokio::test]
    async fn reconnecting_keeps_task_list_bounded() {
        let store = Arc::new(InMemoryRoomStore::new());
        let feed = Arc::new(InMemoryMembershipFeed::new());
        let session = RoomSession::join(store, feed, "room", "ana", SessionConfig::default())
            .await
            .unwrap();

        for _ in 0..8 {
            session.reconnect().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Two store listeners, the live presence pair and at most the pair
        // cancelled by the last reconnect.
        assert!(session.tasks.lock().len() <= 6);
        session.leave().await.unwrap();
    }
}
