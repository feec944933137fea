//! Per-room game state document.

use super::card::{Card, CardColor, Team};
use super::clue::{Clue, ClueType, GuessBudget};
use super::phase::GamePhase;
use serde::{Deserialize, Serialize};

/// Red cards on a fresh board.
pub const RED_CARDS: u32 = 8;

/// Blue cards on a fresh board. Blue holds the extra card and opens.
pub const BLUE_CARDS: u32 = 9;

/// Authoritative state of one room's game.
///
/// The persisted copy in the store is the only truth; every process holds a
/// cached copy that is replaced wholesale on each store notification.
/// `version` is bumped by the store on every accepted write and is what
/// conditional writes are checked against.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub cards: Vec<Card>,
    pub current_turn: Team,
    pub red_cards_left: u32,
    pub blue_cards_left: u32,
    pub game_over: bool,
    pub winner: Option<Team>,
    pub current_clue: Option<Clue>,
    pub guesses_remaining: GuessBudget,
    pub can_guess: bool,
    #[serde(default)]
    pub clue_type: ClueType,
    #[serde(default)]
    pub full_word_list: Vec<String>,
    #[serde(default)]
    pub version: u64,
}

impl GameState {
    /// Fresh state for a dealt board.
    pub fn new(cards: Vec<Card>, full_word_list: Vec<String>) -> Self {
        Self {
            cards,
            current_turn: Team::Blue,
            red_cards_left: RED_CARDS,
            blue_cards_left: BLUE_CARDS,
            game_over: false,
            winner: None,
            current_clue: None,
            guesses_remaining: GuessBudget::Finite(0),
            can_guess: false,
            clue_type: ClueType::Normal,
            full_word_list,
            version: 0,
        }
    }

    pub fn phase(&self) -> GamePhase {
        if self.game_over {
            GamePhase::GameOver
        } else if self.can_guess {
            GamePhase::ClueActive
        } else {
            GamePhase::AwaitingClue
        }
    }

    pub fn cards_left(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red_cards_left,
            Team::Blue => self.blue_cards_left,
        }
    }

    pub(crate) fn cards_left_mut(&mut self, team: Team) -> &mut u32 {
        match team {
            Team::Red => &mut self.red_cards_left,
            Team::Blue => &mut self.blue_cards_left,
        }
    }

    pub fn unrevealed_count(&self, color: CardColor) -> usize {
        self.cards
            .iter()
            .filter(|c| c.color == color && !c.revealed)
            .count()
    }

    /// True once play has begun and until the game ends.
    ///
    /// Team and role changes are only allowed while this is false.
    pub fn in_progress(&self) -> bool {
        !self.game_over && (self.current_clue.is_some() || self.cards.iter().any(|c| c.revealed))
    }

    /// Check the cached counters and win flags against the board.
    pub fn check_invariants(&self) -> Result<(), String> {
        for team in [Team::Red, Team::Blue] {
            let actual = self.unrevealed_count(team.color());
            if actual != self.cards_left(team) as usize {
                return Err(format!(
                    "{team} count is {} but {actual} {team} cards are hidden",
                    self.cards_left(team)
                ));
            }
        }
        if self.winner.is_some() && !self.game_over {
            return Err("winner set while game is not over".to_string());
        }
        if self.game_over && self.can_guess {
            return Err("guessing open on a finished game".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deck::generate_deck;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fresh() -> GameState {
        let words: Vec<String> = (0..25).map(|i| format!("w{i}")).collect();
        let cards = generate_deck(&words, &mut StdRng::seed_from_u64(5)).unwrap();
        GameState::new(cards, words)
    }

    #[test]
    fn fresh_state_awaits_blue_clue() {
        let state = fresh();
        assert_eq!(state.current_turn, Team::Blue);
        assert_eq!(state.phase(), GamePhase::AwaitingClue);
        assert!(!state.in_progress());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_stale_counters() {
        let mut state = fresh();
        state.red_cards_left = 3;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let state = fresh();
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["currentTurn"], "blue");
        assert_eq!(value["redCardsLeft"], 8);
        assert_eq!(value["blueCardsLeft"], 9);
        assert_eq!(value["guessesRemaining"], 0);
        assert_eq!(value["canGuess"], false);
        assert!(value["currentClue"].is_null());
    }

    #[test]
    fn unlimited_budget_round_trips_through_json() {
        let mut state = fresh();
        state.guesses_remaining = GuessBudget::Unlimited;
        state.clue_type = ClueType::Special;

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"guessesRemaining\":\"Infinity\""));

        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.guesses_remaining, GuessBudget::Unlimited);
        assert_eq!(back, state);
    }

    #[test]
    fn legacy_documents_without_optional_fields_still_load() {
        let mut value = serde_json::to_value(fresh()).unwrap();
        let map = value.as_object_mut().unwrap();
        map.remove("clueType");
        map.remove("version");
        map.remove("fullWordList");

        let state: GameState = serde_json::from_value(value).unwrap();
        assert_eq!(state.clue_type, ClueType::Normal);
        assert_eq!(state.version, 0);
        assert!(state.full_word_list.is_empty());
    }
}
