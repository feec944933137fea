//! Pure transitions of a room's game state.
//!
//! Each function takes the current state by reference and returns the next
//! one. Nothing is persisted here; committing the result is the session's job.

use crate::core::{
    clean_words, collect_violations, draw_words, generate_deck, validate_clue, CardColor, Clue,
    ClueNumber, ClueType, GameError, GameState, GuessBudget, Team, BOARD_SIZE,
};
use rand::Rng;

/// Outcome of a reset.
///
/// Besides the fresh state, a reset requires the room's history and every
/// player's team and role to be cleared. Stores apply all three together.
#[derive(Clone, PartialEq, Debug)]
pub struct ResetPlan {
    pub state: GameState,
    pub clear_history: bool,
    pub clear_player_assignments: bool,
}

/// Deal a new game from `words`, keeping `full_word_list` for later resets.
pub fn start_game<R: Rng + ?Sized>(
    words: &[String],
    full_word_list: &[String],
    rng: &mut R,
) -> Result<GameState, GameError> {
    if words.len() < BOARD_SIZE {
        return Err(GameError::InvalidWordList(format!(
            "need at least {BOARD_SIZE} words, got {}",
            words.len()
        )));
    }

    let pool = clean_words(full_word_list.iter().map(String::as_str));
    if pool.len() < BOARD_SIZE {
        return Err(GameError::InvalidWordList(format!(
            "full word list needs at least {BOARD_SIZE} usable words, got {}",
            pool.len()
        )));
    }

    let cards = generate_deck(words, rng)?;
    Ok(GameState::new(cards, pool))
}

/// Put a clue on the table for `team` and open guessing.
pub fn give_clue(
    state: &GameState,
    team: Team,
    text: &str,
    number: ClueNumber,
) -> Result<GameState, GameError> {
    collect_violations(validate_clue(text, number)).map_err(GameError::InvalidClue)?;

    if state.game_over {
        return Err(GameError::GameOver);
    }
    if team != state.current_turn {
        return Err(GameError::OutOfTurn {
            expected: state.current_turn,
            found: team,
        });
    }
    if state.can_guess {
        return Err(GameError::ClueActive);
    }

    let (budget, clue_type) = number.budget();
    let mut next = state.clone();
    next.current_clue = Some(Clue {
        text: text.trim().to_string(),
        number,
    });
    next.guesses_remaining = budget;
    next.clue_type = clue_type;
    next.can_guess = true;
    Ok(next)
}

/// Reveal the card at `index` and resolve its consequences.
///
/// Revealing an already revealed card, or any card once the game is over,
/// returns the state unchanged.
pub fn reveal_card(state: &GameState, index: usize) -> Result<GameState, GameError> {
    let card = state.cards.get(index).ok_or(GameError::CardOutOfRange {
        index,
        len: state.cards.len(),
    })?;
    if card.revealed || state.game_over {
        return Ok(state.clone());
    }

    let guessing = state.current_turn;
    let color = card.color;
    let mut next = state.clone();
    next.cards[index].revealed = true;

    match (color, color.team()) {
        (CardColor::Assassin, _) => {
            finish(&mut next, guessing.opponent());
            return Ok(next);
        }
        (_, Some(owner)) => {
            let left = next.cards_left_mut(owner);
            *left = left.saturating_sub(1);

            if owner != guessing {
                close_turn(&mut next);
            } else if next.clue_type == ClueType::Normal {
                next.guesses_remaining = next.guesses_remaining.spend();
                if next.guesses_remaining.is_exhausted() {
                    close_turn(&mut next);
                }
            }
        }
        (_, None) => close_turn(&mut next),
    }

    // Colors are disjoint, so at most one count can have just reached zero.
    if let Some(winner) = [Team::Red, Team::Blue]
        .into_iter()
        .find(|&team| next.cards_left(team) == 0)
    {
        finish(&mut next, winner);
    }

    Ok(next)
}

/// Pass the turn to the other team. A finished game is returned unchanged.
pub fn end_turn(state: &GameState) -> GameState {
    let mut next = state.clone();
    if !next.game_over {
        close_turn(&mut next);
    }
    next
}

/// Deal a fresh board from the retained word pool.
pub fn reset_game<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Result<ResetPlan, GameError> {
    let pool = &state.full_word_list;
    if pool.len() < BOARD_SIZE {
        return Err(GameError::InvalidWordList(format!(
            "full word list needs at least {BOARD_SIZE} words to reset, got {}",
            pool.len()
        )));
    }

    let words = draw_words(pool, rng)?;
    let cards = generate_deck(&words, rng)?;
    let mut fresh = GameState::new(cards, pool.clone());
    fresh.version = state.version;

    Ok(ResetPlan {
        state: fresh,
        clear_history: true,
        clear_player_assignments: true,
    })
}

fn close_turn(state: &mut GameState) {
    state.current_turn = state.current_turn.opponent();
    state.current_clue = None;
    state.guesses_remaining = GuessBudget::Finite(0);
    state.can_guess = false;
    state.clue_type = ClueType::Normal;
}

fn finish(state: &mut GameState, winner: Team) {
    state.game_over = true;
    state.winner = Some(winner);
    state.can_guess = false;
    state.guesses_remaining = GuessBudget::Finite(0);
}
