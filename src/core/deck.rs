//! Deck generation.
//!
//! All functions here are pure apart from drawing from the caller's RNG, so
//! a seeded RNG deals the same board every time.

use super::card::{Card, CardColor};
use super::error::GameError;
use rand::seq::{index, SliceRandom};
use rand::Rng;

/// Number of cards on the board.
pub const BOARD_SIZE: usize = 25;

/// Longest word accepted from a raw word list.
pub const MAX_WORD_LEN: usize = 30;

/// Fixed color split of a board: 8 red, 9 blue, 7 neutral, 1 assassin.
pub const COLOR_DISTRIBUTION: [(CardColor, usize); 4] = [
    (CardColor::Red, 8),
    (CardColor::Blue, 9),
    (CardColor::Neutral, 7),
    (CardColor::Assassin, 1),
];

fn color_pool() -> Vec<CardColor> {
    COLOR_DISTRIBUTION
        .iter()
        .flat_map(|&(color, count)| std::iter::repeat(color).take(count))
        .collect()
}

/// Deal a board from the first 25 words.
///
/// Colors are permuted with a Fisher-Yates shuffle, so every arrangement of
/// the fixed distribution is equally likely.
pub fn generate_deck<R: Rng + ?Sized>(words: &[String], rng: &mut R) -> Result<Vec<Card>, GameError> {
    if words.len() < BOARD_SIZE {
        return Err(GameError::InvalidInput {
            needed: BOARD_SIZE,
            found: words.len(),
        });
    }

    let mut colors = color_pool();
    colors.shuffle(rng);

    Ok(words
        .iter()
        .take(BOARD_SIZE)
        .zip(colors)
        .map(|(word, color)| Card::new(word.clone(), color))
        .collect())
}

/// Draw 25 words from the pool, each position at most once, in random order.
pub fn draw_words<R: Rng + ?Sized>(pool: &[String], rng: &mut R) -> Result<Vec<String>, GameError> {
    if pool.len() < BOARD_SIZE {
        return Err(GameError::InvalidInput {
            needed: BOARD_SIZE,
            found: pool.len(),
        });
    }

    Ok(index::sample(rng, pool.len(), BOARD_SIZE)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect())
}

/// Split a newline separated word list, dropping blanks and overlong words.
pub fn parse_word_list(raw: &str) -> Vec<String> {
    clean_words(raw.lines())
}

/// Trim each word, dropping blanks and words longer than [`MAX_WORD_LEN`].
pub fn clean_words<'a, I>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    words
        .into_iter()
        .map(str::trim)
        .filter(|word| !word.is_empty() && word.chars().count() <= MAX_WORD_LEN)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{i}")).collect()
    }

    fn count(cards: &[Card], color: CardColor) -> usize {
        cards.iter().filter(|c| c.color == color).count()
    }

    #[test]
    fn deck_has_fixed_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = generate_deck(&words(40), &mut rng).unwrap();

        assert_eq!(deck.len(), BOARD_SIZE);
        assert_eq!(count(&deck, CardColor::Red), 8);
        assert_eq!(count(&deck, CardColor::Blue), 9);
        assert_eq!(count(&deck, CardColor::Neutral), 7);
        assert_eq!(count(&deck, CardColor::Assassin), 1);
        assert!(deck.iter().all(|c| !c.revealed));
    }

    #[test]
    fn deck_uses_first_words_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = words(30);
        let deck = generate_deck(&input, &mut rng).unwrap();

        for (card, word) in deck.iter().zip(&input) {
            assert_eq!(&card.word, word);
        }
    }

    #[test]
    fn short_word_list_is_invalid_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = generate_deck(&words(24), &mut rng);
        assert!(matches!(
            result,
            Err(GameError::InvalidInput {
                needed: 25,
                found: 24
            })
        ));
    }

    #[test]
    fn same_seed_deals_same_board() {
        let input = words(25);
        let a = generate_deck(&input, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = generate_deck(&input, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn assassin_position_is_roughly_uniform() {
        let input = words(25);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut hits = [0usize; BOARD_SIZE];
        let trials = 10_000;

        for _ in 0..trials {
            let deck = generate_deck(&input, &mut rng).unwrap();
            let pos = deck
                .iter()
                .position(|c| c.color == CardColor::Assassin)
                .unwrap();
            hits[pos] += 1;
        }

        // Expected 400 per slot; a biased sort would skew far past these bounds.
        for &h in &hits {
            assert!((250..=550).contains(&h), "slot hit {h} times");
        }
    }

    #[test]
    fn draw_words_takes_distinct_positions() {
        let pool = words(60);
        let mut rng = StdRng::seed_from_u64(3);
        let drawn = draw_words(&pool, &mut rng).unwrap();

        assert_eq!(drawn.len(), BOARD_SIZE);
        let mut unique = drawn.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), BOARD_SIZE);
    }

    #[test]
    fn parse_word_list_filters_noise() {
        let long = "x".repeat(31);
        let raw = format!("  apple \n\n banana\n{long}\n\tcherry\n");
        assert_eq!(parse_word_list(&raw), vec!["apple", "banana", "cherry"]);
    }
}
