//! Cards, colors and teams.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two competing sides.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// The other team.
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// The card color this team is trying to uncover.
    pub fn color(self) -> CardColor {
        match self {
            Self::Red => CardColor::Red,
            Self::Blue => CardColor::Blue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hidden identity of a card.
///
/// Older room documents spell the assassin `black`; both spellings are
/// accepted on read, `assassin` is always written.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Red,
    Blue,
    Neutral,
    #[serde(alias = "black")]
    Assassin,
}

impl CardColor {
    /// The team that owns this color, if any.
    pub fn team(self) -> Option<Team> {
        match self {
            Self::Red => Some(Team::Red),
            Self::Blue => Some(Team::Blue),
            Self::Neutral | Self::Assassin => None,
        }
    }
}

/// A single word card on the board.
///
/// `word` and `color` never change after the deck is dealt. `revealed`
/// flips from false to true exactly once.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Card {
    pub word: String,
    pub color: CardColor,
    pub revealed: bool,
}

impl Card {
    pub fn new(word: impl Into<String>, color: CardColor) -> Self {
        Self {
            word: word.into(),
            color,
            revealed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_an_involution() {
        assert_eq!(Team::Red.opponent(), Team::Blue);
        assert_eq!(Team::Blue.opponent().opponent(), Team::Blue);
    }

    #[test]
    fn team_colors_map_back_to_teams() {
        assert_eq!(Team::Red.color().team(), Some(Team::Red));
        assert_eq!(Team::Blue.color().team(), Some(Team::Blue));
        assert_eq!(CardColor::Neutral.team(), None);
        assert_eq!(CardColor::Assassin.team(), None);
    }

    #[test]
    fn legacy_black_reads_as_assassin() {
        let color: CardColor = serde_json::from_str("\"black\"").unwrap();
        assert_eq!(color, CardColor::Assassin);
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"assassin\"");
    }

    #[test]
    fn new_card_starts_hidden() {
        let card = Card::new("apple", CardColor::Red);
        assert!(!card.revealed);
        assert_eq!(card.word, "apple");
    }
}
