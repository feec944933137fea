//! Wire types of the membership feed.

use crate::core::{Role, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Presence state of a channel: presence key to the metas tracked under it.
pub type PresenceState = HashMap<String, Vec<PresenceMeta>>;

/// What a client announces about itself while tracked on a channel.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PresenceMeta {
    pub player_id: String,
    pub name: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub online_at: DateTime<Utc>,
}

impl PresenceMeta {
    pub fn new(name: impl Into<String>, team: Option<Team>, role: Option<Role>) -> Self {
        let name = name.into();
        Self {
            player_id: name.clone(),
            name,
            team,
            role,
            online_at: Utc::now(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PresenceEvent {
    /// Full membership of the channel
    Sync { state: PresenceState },
    Join {
        key: String,
        new_presences: Vec<PresenceMeta>,
    },
    Leave {
        key: String,
        left_presences: Vec<PresenceMeta>,
    },
}

impl PresenceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
        }
    }

    /// Every meta carried by the event.
    pub fn metas(&self) -> Box<dyn Iterator<Item = &PresenceMeta> + '_> {
        match self {
            Self::Sync { state } => Box::new(state.values().flatten()),
            Self::Join { new_presences, .. } => Box::new(new_presences.iter()),
            Self::Leave { left_presences, .. } => Box::new(left_presences.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_tagged_wire_shape() {
        let event = PresenceEvent::Join {
            key: "ana".into(),
            new_presences: vec![PresenceMeta::new("ana", Some(Team::Red), None)],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "join");
        assert_eq!(value["new_presences"][0]["team"], "red");
        assert_eq!(value["new_presences"][0]["role"], serde_json::Value::Null);
    }

    #[test]
    fn sync_parses_from_feed_json() {
        let event: PresenceEvent = serde_json::from_value(json!({
            "event": "sync",
            "state": {
                "ana": [{
                    "player_id": "ana",
                    "name": "ana",
                    "team": "blue",
                    "role": "spymaster",
                    "online_at": "2024-05-01T10:00:00Z"
                }]
            }
        }))
        .unwrap();

        assert_eq!(event.name(), "sync");
        let metas: Vec<_> = event.metas().collect();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].role, Some(Role::Spymaster));
    }
}
