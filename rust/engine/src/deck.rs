use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{full_deck, Card};
use crate::errors::DeckError;

/// An ordered stack of distinct cards consumed strictly front-to-back.
///
/// The deck never grows: dealt, burned and discarded cards leave it for good,
/// so a card can never appear twice within one round or hand. The RNG is used
/// only at construction, which keeps the deck itself plain data that can be
/// persisted and reloaded by any server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A freshly shuffled 52-card deck seeded from the operating system's
    /// entropy source through ChaCha20.
    pub fn new_shuffled() -> Self {
        let mut rng = ChaCha20Rng::from_os_rng();
        Self::shuffled_with(&mut rng)
    }

    /// Reproducible shuffle for replays, audits and tests.
    pub fn new_with_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self::shuffled_with(&mut rng)
    }

    pub fn shuffled_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cards = full_deck();
        cards.shuffle(rng);
        Self { cards }
    }

    /// Unshuffled deck in canonical order.
    pub fn ordered() -> Self {
        Self { cards: full_deck() }
    }

    /// Builds a deck whose next cards are exactly `cards`, in order.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Removes and returns the next `n` cards.
    ///
    /// Fails without touching the deck when fewer than `n` cards remain.
    pub fn draw(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if n > self.cards.len() {
            return Err(DeckError::InsufficientCards {
                requested: n,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.drain(..n).collect())
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }

    pub fn burn_card(&mut self) -> Result<(), DeckError> {
        self.draw(1).map(|_| ())
    }

    /// Looks at the card `offset` positions from the top without removing it.
    pub fn peek(&self, offset: usize) -> Option<Card> {
        self.cards.get(offset).copied()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_too_many_leaves_deck_untouched() {
        let mut deck = Deck::new_with_seed(3);
        deck.draw(50).unwrap();
        let err = deck.draw(3).unwrap_err();
        assert_eq!(
            err,
            DeckError::InsufficientCards {
                requested: 3,
                remaining: 2
            }
        );
        assert_eq!(deck.remaining(), 2);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut deck = Deck::new_with_seed(9);
        let top = deck.peek(0).unwrap();
        assert_eq!(deck.remaining(), 52);
        assert_eq!(deck.deal_card(), Some(top));
    }

    #[test]
    fn survives_serde_round_trip_mid_hand() {
        let mut deck = Deck::new_with_seed(11);
        deck.draw(7).unwrap();
        let json = serde_json::to_string(&deck).unwrap();
        let back: Deck = serde_json::from_str(&json).unwrap();
        assert_eq!(back, deck);
        assert_eq!(back.remaining(), 45);
    }
}
