//! Eventually consistent view of who is online in a room.
//!
//! The membership feed owns online status, including whether the local
//! player is connected; the store owns team and role.
//! Feed events only merge into the roster. A `leave` never touches team or
//! role, and the local player's assignment changes only through
//! [`PresenceSynchronizer::assign_local`], [`PresenceSynchronizer::merge_players`]
//! and [`PresenceSynchronizer::clear_assignments`].

use super::error::PresenceError;
use super::event::{PresenceEvent, PresenceMeta};
use crate::core::{Player, Role, Team};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The player running this session.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct LocalPlayer {
    pub username: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub is_connected: bool,
}

/// One roster line.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct RosterEntry {
    pub username: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub online: bool,
    pub online_at: Option<DateTime<Utc>>,
}

impl RosterEntry {
    fn offline(username: &str) -> Self {
        Self {
            username: username.to_string(),
            team: None,
            role: None,
            online: false,
            online_at: None,
        }
    }

    fn merge_meta(&mut self, meta: &PresenceMeta) {
        self.team = meta.team.or(self.team);
        self.role = meta.role.or(self.role);
        self.online = true;
        self.online_at = Some(meta.online_at);
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct PresenceSnapshot {
    /// Online players, ordered by username
    pub online_players: Vec<RosterEntry>,
    pub last_update: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PresenceSynchronizer {
    local: LocalPlayer,
    roster: BTreeMap<String, RosterEntry>,
    last_update: DateTime<Utc>,
}

impl PresenceSynchronizer {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            local: LocalPlayer {
                username: username.into(),
                team: None,
                role: None,
                is_connected: false,
            },
            roster: BTreeMap::new(),
            last_update: Utc::now(),
        }
    }

    pub fn local(&self) -> &LocalPlayer {
        &self.local
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.local.is_connected = connected;
        self.touch();
    }

    /// Set the local assignment and mirror it into the roster.
    pub fn assign_local(&mut self, team: Option<Team>, role: Option<Role>) {
        self.local.team = team;
        self.local.role = role;
        let entry = self
            .roster
            .entry(self.local.username.clone())
            .or_insert_with(|| RosterEntry::offline(&self.local.username));
        entry.team = team;
        entry.role = role;
        self.touch();
    }

    /// The meta the local player announces on the feed.
    pub fn local_meta(&self) -> PresenceMeta {
        PresenceMeta::new(self.local.username.clone(), self.local.team, self.local.role)
    }

    /// Merge one feed event. A malformed event is rejected whole.
    pub fn apply(&mut self, event: &PresenceEvent) -> Result<(), PresenceError> {
        if let Some(meta) = event.metas().find(|meta| meta.name.trim().is_empty()) {
            return Err(PresenceError::MalformedPresence(format!(
                "{} event carries a meta without a name (player_id '{}')",
                event.name(),
                meta.player_id
            )));
        }

        match event {
            PresenceEvent::Sync { state } => {
                let mut seen = BTreeMap::new();
                for meta in state.values().flatten() {
                    // Latest announcement wins when a name is tracked twice.
                    let newer = seen
                        .get(meta.name.as_str())
                        .map_or(true, |prev: &&PresenceMeta| prev.online_at <= meta.online_at);
                    if newer {
                        seen.insert(meta.name.as_str(), meta);
                    }
                }
                for entry in self.roster.values_mut() {
                    if !seen.contains_key(entry.username.as_str()) {
                        entry.online = false;
                    }
                }
                self.local.is_connected = seen.contains_key(self.local.username.as_str());
                for meta in seen.into_values() {
                    self.merge_meta(meta);
                }
            }
            PresenceEvent::Join { new_presences, .. } => {
                for meta in new_presences {
                    if meta.name == self.local.username {
                        self.local.is_connected = true;
                    }
                    self.merge_meta(meta);
                }
            }
            PresenceEvent::Leave { left_presences, .. } => {
                for meta in left_presences {
                    if meta.name == self.local.username {
                        self.local.is_connected = false;
                    }
                    if let Some(entry) = self.roster.get_mut(&meta.name) {
                        entry.online = false;
                    }
                }
            }
        }

        self.touch();
        Ok(())
    }

    /// Overwrite team and role from durable player records.
    pub fn merge_players(&mut self, players: &[Player]) {
        for player in players {
            let entry = self
                .roster
                .entry(player.username.clone())
                .or_insert_with(|| RosterEntry::offline(&player.username));
            entry.team = player.team;
            entry.role = player.role;
            if player.username == self.local.username {
                self.local.team = player.team;
                self.local.role = player.role;
            }
        }
        self.touch();
    }

    pub fn clear_assignments(&mut self) {
        self.local.team = None;
        self.local.role = None;
        for entry in self.roster.values_mut() {
            entry.team = None;
            entry.role = None;
        }
        self.touch();
    }

    pub fn entry(&self, username: &str) -> Option<&RosterEntry> {
        self.roster.get(username)
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            online_players: self
                .roster
                .values()
                .filter(|entry| entry.online)
                .cloned()
                .collect(),
            last_update: self.last_update,
        }
    }

    fn merge_meta(&mut self, meta: &PresenceMeta) {
        self.roster
            .entry(meta.name.clone())
            .or_insert_with(|| RosterEntry::offline(&meta.name))
            .merge_meta(meta);
    }

    fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn meta(name: &str, team: Option<Team>, role: Option<Role>) -> PresenceMeta {
        PresenceMeta::new(name, team, role)
    }

    fn join(name: &str, team: Option<Team>, role: Option<Role>) -> PresenceEvent {
        PresenceEvent::Join {
            key: name.into(),
            new_presences: vec![meta(name, team, role)],
        }
    }

    fn online_names(sync: &PresenceSynchronizer) -> Vec<String> {
        sync.snapshot()
            .online_players
            .into_iter()
            .map(|entry| entry.username)
            .collect()
    }

    #[test]
    fn join_merges_only_the_joiner() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("ana", Some(Team::Red), Some(Role::Spymaster)))
            .unwrap();
        let before = sync.entry("ana").cloned();

        sync.apply(&join("bob", Some(Team::Blue), None)).unwrap();

        assert_eq!(online_names(&sync), vec!["ana", "bob"]);
        assert_eq!(sync.entry("ana").cloned(), before);
    }

    #[test]
    fn leave_marks_offline_and_keeps_assignment() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("ana", Some(Team::Red), Some(Role::Spymaster)))
            .unwrap();

        sync.apply(&PresenceEvent::Leave {
            key: "ana".into(),
            left_presences: vec![meta("ana", None, None)],
        })
        .unwrap();

        let ana = sync.entry("ana").unwrap();
        assert!(!ana.online);
        assert_eq!(ana.team, Some(Team::Red));
        assert_eq!(ana.role, Some(Role::Spymaster));
        assert!(online_names(&sync).is_empty());
    }

    #[test]
    fn sync_falls_back_to_known_assignment_and_drops_absent() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("ana", Some(Team::Red), Some(Role::Operative)))
            .unwrap();
        sync.apply(&join("bob", Some(Team::Blue), None)).unwrap();

        let mut state = HashMap::new();
        state.insert("ana".to_string(), vec![meta("ana", None, None)]);
        state.insert("cy".to_string(), vec![meta("cy", Some(Team::Blue), None)]);
        sync.apply(&PresenceEvent::Sync { state }).unwrap();

        assert_eq!(online_names(&sync), vec!["ana", "cy"]);
        let ana = sync.entry("ana").unwrap();
        assert_eq!(ana.team, Some(Team::Red));
        assert_eq!(ana.role, Some(Role::Operative));
        let bob = sync.entry("bob").unwrap();
        assert!(!bob.online);
        assert_eq!(bob.team, Some(Team::Blue));
    }

    #[test]
    fn malformed_event_changes_nothing() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("ana", None, None)).unwrap();

        let event = PresenceEvent::Join {
            key: "x".into(),
            new_presences: vec![meta("bob", None, None), meta(" ", None, None)],
        };
        assert!(matches!(
            sync.apply(&event),
            Err(PresenceError::MalformedPresence(_))
        ));
        assert_eq!(online_names(&sync), vec!["ana"]);
    }

    #[test]
    fn feed_never_overwrites_local_assignment() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.assign_local(Some(Team::Blue), Some(Role::Spymaster));

        sync.apply(&join("me", Some(Team::Red), Some(Role::Operative)))
            .unwrap();

        assert_eq!(sync.local().team, Some(Team::Blue));
        assert_eq!(sync.local().role, Some(Role::Spymaster));
    }

    #[test]
    fn local_connection_follows_the_feed() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("me", None, None)).unwrap();
        assert!(sync.local().is_connected);

        sync.apply(&PresenceEvent::Sync {
            state: HashMap::new(),
        })
        .unwrap();
        assert!(!sync.local().is_connected);
    }

    #[test]
    fn durable_records_overwrite_roster_and_local() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.apply(&join("ana", Some(Team::Red), Some(Role::Spymaster)))
            .unwrap();

        let mut me = Player::joined("me");
        me.team = Some(Team::Red);
        me.role = Some(Role::Operative);
        let ana = Player::joined("ana");
        sync.merge_players(&[me, ana]);

        assert_eq!(sync.local().team, Some(Team::Red));
        assert_eq!(sync.local().role, Some(Role::Operative));
        let ana = sync.entry("ana").unwrap();
        assert!(ana.online);
        assert!(ana.team.is_none());
    }

    #[test]
    fn clear_assignments_resets_everyone() {
        let mut sync = PresenceSynchronizer::new("me");
        sync.assign_local(Some(Team::Red), Some(Role::Spymaster));
        sync.apply(&join("ana", Some(Team::Blue), Some(Role::Operative)))
            .unwrap();

        sync.clear_assignments();

        assert!(sync.local().team.is_none());
        assert!(sync
            .snapshot()
            .online_players
            .iter()
            .all(|entry| entry.team.is_none() && entry.role.is_none()));
    }
}
