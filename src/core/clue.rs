//! Clues, clue numbers and guess budgets.
//!
//! Two values in the room document can be unbounded: the number a spymaster
//! announces ("unlimited") and the guess budget that follows from it. JSON
//! has no infinite number, so both are written as the reserved string token
//! [`UNLIMITED_TOKEN`] and turned back into the in-memory sentinel on read.

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Wire token for an unbounded clue number or guess budget.
pub const UNLIMITED_TOKEN: &str = "Infinity";

/// Largest finite number a spymaster may announce.
pub const MAX_CLUE_COUNT: u8 = 9;

/// The number announced with a clue, kept as said for display.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClueNumber {
    Count(u8),
    Unlimited,
}

/// How many reveals the guessing team has left this turn.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GuessBudget {
    Finite(u32),
    Unlimited,
}

/// Special clues (0 or unlimited) never end the turn by exhausting the budget.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClueType {
    #[default]
    Normal,
    Special,
}

/// The clue currently on the table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Clue {
    pub text: String,
    pub number: ClueNumber,
}

impl ClueNumber {
    /// Budget and clue type granted by this number.
    ///
    /// Zero and unlimited clues are special and unbounded. Every finite clue
    /// grants one guess beyond its count.
    pub fn budget(self) -> (GuessBudget, ClueType) {
        match self {
            Self::Count(0) | Self::Unlimited => (GuessBudget::Unlimited, ClueType::Special),
            Self::Count(n) => (GuessBudget::Finite(u32::from(n) + 1), ClueType::Normal),
        }
    }

    pub fn is_in_domain(self) -> bool {
        match self {
            Self::Count(n) => n <= MAX_CLUE_COUNT,
            Self::Unlimited => true,
        }
    }
}

impl fmt::Display for ClueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("∞"),
        }
    }
}

impl GuessBudget {
    pub fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Finite(0))
    }

    /// Spend one guess. Unlimited budgets are unaffected.
    pub fn spend(self) -> Self {
        match self {
            Self::Finite(n) => Self::Finite(n.saturating_sub(1)),
            Self::Unlimited => Self::Unlimited,
        }
    }
}

impl Default for GuessBudget {
    fn default() -> Self {
        Self::Finite(0)
    }
}

/// Reasons a clue is refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClueViolation {
    #[error("Clue text must not be empty")]
    EmptyText,

    #[error("Clue number {number} is outside 0..={max} and is not unlimited", max = MAX_CLUE_COUNT)]
    NumberOutOfRange { number: u8 },
}

/// Validate a clue without touching any state, accumulating every violation.
pub fn validate_clue(text: &str, number: ClueNumber) -> Validation<(), NonEmptyVec<ClueViolation>> {
    let text_check = if text.trim().is_empty() {
        Validation::fail(ClueViolation::EmptyText)
    } else {
        Validation::success(())
    };

    let number_check = match number {
        ClueNumber::Count(n) if !number.is_in_domain() => {
            Validation::fail(ClueViolation::NumberOutOfRange { number: n })
        }
        _ => Validation::success(()),
    };

    Validation::all_vec(vec![text_check, number_check]).map(|_| ())
}

struct BoundedOrUnlimited;

impl<'de> Visitor<'de> for BoundedOrUnlimited {
    type Value = Option<u64>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a non-negative integer or \"{UNLIMITED_TOKEN}\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(Some)
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_infinite() && v.is_sign_positive() {
            Ok(None)
        } else if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
            Ok(Some(v as u64))
        } else {
            Err(E::invalid_value(Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v == UNLIMITED_TOKEN {
            Ok(None)
        } else {
            Err(E::invalid_value(Unexpected::Str(v), &self))
        }
    }
}

impl Serialize for ClueNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u8(*n),
            Self::Unlimited => serializer.serialize_str(UNLIMITED_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for ClueNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match deserializer.deserialize_any(BoundedOrUnlimited)? {
            None => Ok(Self::Unlimited),
            Some(n) => u8::try_from(n)
                .map(Self::Count)
                .map_err(|_| de::Error::invalid_value(Unexpected::Unsigned(n), &"a clue count")),
        }
    }
}

impl Serialize for GuessBudget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(n) => serializer.serialize_u32(*n),
            Self::Unlimited => serializer.serialize_str(UNLIMITED_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for GuessBudget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match deserializer.deserialize_any(BoundedOrUnlimited)? {
            None => Ok(Self::Unlimited),
            Some(n) => u32::try_from(n)
                .map(Self::Finite)
                .map_err(|_| de::Error::invalid_value(Unexpected::Unsigned(n), &"a guess budget")),
        }
    }
}
