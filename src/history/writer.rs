//! Validation and appending of history actions.

use super::error::{ActionViolation, HistoryError};
use super::log::{HistoryAction, HistoryRecord};
use crate::core::{collect_violations, ClueNumber, RoomId, Team};
use crate::store::RoomStore;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

const LOG_TARGET: &str = "codenames_core::history";

/// Check an action's shape, accumulating every violation.
pub fn validate_action(action: &HistoryAction) -> Validation<(), NonEmptyVec<ActionViolation>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<ActionViolation>>> = Vec::new();

    match action {
        HistoryAction::Clue { clue, number, .. } => {
            checks.push(if clue.trim().is_empty() {
                Validation::fail(ActionViolation::EmptyClue)
            } else {
                Validation::success(())
            });
            checks.push(match number {
                ClueNumber::Count(n) if !number.is_in_domain() => {
                    Validation::fail(ActionViolation::ClueNumberOutOfRange { number: *n })
                }
                _ => Validation::success(()),
            });
        }
        HistoryAction::Guess { word, .. } => {
            checks.push(if word.trim().is_empty() {
                Validation::fail(ActionViolation::EmptyWord)
            } else {
                Validation::success(())
            });
        }
    }

    Validation::all_vec(checks).map(|_| ())
}

#[derive(Deserialize)]
struct RawClue {
    team: Team,
    clue: String,
    number: ClueNumber,
}

#[derive(Deserialize)]
struct RawGuess {
    team: Team,
    word: String,
    correct: bool,
}

fn malformed(err: serde_json::Error) -> HistoryError {
    HistoryError::InvalidAction(vec![ActionViolation::Malformed(err.to_string())])
}

impl HistoryAction {
    /// Build an action from its untyped wire form and validate it.
    pub fn from_raw(action_type: &str, data: Value) -> Result<Self, HistoryError> {
        let action = match action_type {
            "clue" => {
                let raw: RawClue = serde_json::from_value(data).map_err(malformed)?;
                Self::Clue {
                    team: raw.team,
                    clue: raw.clue,
                    number: raw.number,
                }
            }
            "guess" => {
                let raw: RawGuess = serde_json::from_value(data).map_err(malformed)?;
                Self::Guess {
                    team: raw.team,
                    word: raw.word,
                    correct: raw.correct,
                }
            }
            other => {
                return Err(HistoryError::InvalidAction(vec![
                    ActionViolation::UnknownType(other.to_string()),
                ]))
            }
        };

        collect_violations(validate_action(&action)).map_err(HistoryError::InvalidAction)?;
        Ok(action)
    }
}

/// Writes validated actions to a room's history through the store.
#[derive(Clone)]
pub struct HistoryWriter {
    store: Arc<dyn RoomStore>,
}

impl HistoryWriter {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Validate and append. Invalid actions never reach the store.
    pub async fn record(
        &self,
        room_id: &RoomId,
        action: HistoryAction,
    ) -> Result<HistoryRecord, HistoryError> {
        collect_violations(validate_action(&action)).map_err(HistoryError::InvalidAction)?;

        let record = HistoryRecord::new(room_id.clone(), action);
        self.store.append_history(room_id, record.clone()).await?;
        debug!(
            target: LOG_TARGET,
            room = %room_id,
            action = record.action.action_type(),
            "history appended"
        );
        Ok(record)
    }
}
