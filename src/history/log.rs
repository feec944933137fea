//! Append-only history of a room's play.

use crate::core::{ClueNumber, RoomId, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logged player action.
///
/// On the wire the variant is the `action_type` and its fields are the
/// `action_data` object.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(
    tag = "action_type",
    content = "action_data",
    rename_all = "lowercase"
)]
pub enum HistoryAction {
    Clue {
        team: Team,
        clue: String,
        number: ClueNumber,
    },
    Guess {
        team: Team,
        word: String,
        correct: bool,
    },
}

impl HistoryAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Clue { .. } => "clue",
            Self::Guess { .. } => "guess",
        }
    }
}

/// One entry of the audit trail. Never mutated once written.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub room_id: RoomId,
    #[serde(flatten)]
    pub action: HistoryAction,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(room_id: RoomId, action: HistoryAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            action,
            created_at: Utc::now(),
        }
    }
}

/// Ordered history of a room.
///
/// The log is immutable; `record` returns a new log with the entry appended.
/// Entries keep submission order, which is the order of their timestamps.
///
/// # Example
///
/// ```rust
/// use codenames_core::core::{ClueNumber, RoomId, Team};
/// use codenames_core::history::{HistoryAction, HistoryLog, HistoryRecord};
///
/// let room = RoomId::new("amber-fox-river");
/// let log = HistoryLog::new();
/// let log = log.record(HistoryRecord::new(
///     room.clone(),
///     HistoryAction::Clue { team: Team::Blue, clue: "ocean".into(), number: ClueNumber::Count(2) },
/// ));
/// let log = log.record(HistoryRecord::new(
///     room,
///     HistoryAction::Guess { team: Team::Blue, word: "wave".into(), correct: true },
/// ));
///
/// assert_eq!(log.len(), 2);
/// assert_eq!(log.recent(1)[0].action.action_type(), "guess");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record, returning a new log and leaving this one unchanged.
    pub fn record(&self, record: HistoryRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&HistoryRecord> {
        self.records.iter().rev().take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

}
