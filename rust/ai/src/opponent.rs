//! Fixed-difficulty combat opponent.
//!
//! The opponent shuffles its own deck from the round's seed, draws five
//! cards and, depending on difficulty, makes one hold/discard pass. Same
//! seed, same hand: every server instance resolving a round sees the same
//! opponent.

use std::str::FromStr;

use gambit_engine::cards::Card;
use gambit_engine::deck::Deck;
use gambit_engine::errors::OpponentError;
use gambit_engine::hand::{Category, evaluate};
use gambit_engine::round::{HAND_SIZE, OpponentHandSupplier, OpponentRequest};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Difficulty {
    /// Stands pat on the first five cards
    Easy,
    /// Keeps made hands and high cards, redraws the rest
    Normal,
    /// Like normal, and also keeps four-card flush and open-ended straight draws
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = OpponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(OpponentError(format!("unknown opponent difficulty `{other}`"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineOpponent {
    difficulty: Difficulty,
}

impl BaselineOpponent {
    pub fn new(difficulty: Difficulty) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Draws and plays a hand from `deck`.
    pub fn play_from(&self, deck: &mut Deck) -> Result<Vec<Card>, OpponentError> {
        let mut hand = draw(deck, HAND_SIZE)?;
        if self.difficulty == Difficulty::Easy {
            return Ok(hand);
        }
        let held = self.choose_holds(&hand)?;
        let slots: Vec<usize> = (0..hand.len()).filter(|i| !held.contains(i)).collect();
        let fresh = draw(deck, slots.len())?;
        for (slot, card) in slots.into_iter().zip(fresh) {
            hand[slot] = card;
        }
        Ok(hand)
    }

    /// Indices worth keeping from a dealt hand.
    pub fn choose_holds(&self, hand: &[Card]) -> Result<Vec<usize>, OpponentError> {
        let rank = evaluate(hand).map_err(|e| OpponentError(e.to_string()))?;
        if rank.category >= Category::Straight {
            return Ok((0..hand.len()).collect());
        }
        let paired = indices_where(hand, |c| {
            hand.iter().filter(|o| o.rank == c.rank).count() >= 2
        });
        if !paired.is_empty() {
            return Ok(paired);
        }
        if self.difficulty == Difficulty::Hard {
            if let Some(flush) = four_flush(hand) {
                return Ok(flush);
            }
            if let Some(straight) = open_ended(hand) {
                return Ok(straight);
            }
        }
        // up to two high cards, jack or better
        let mut high = indices_where(hand, |c| c.rank.value() >= 11);
        high.sort_by_key(|&i| std::cmp::Reverse(hand[i].rank));
        high.truncate(2);
        high.sort_unstable();
        Ok(high)
    }
}

impl OpponentHandSupplier for BaselineOpponent {
    fn opponent_hand(&self, request: &OpponentRequest) -> Result<Vec<Card>, OpponentError> {
        let mut deck = Deck::new_with_seed(request.seed);
        self.play_from(&mut deck)
    }

    fn name(&self) -> &str {
        self.difficulty.as_str()
    }
}

fn draw(deck: &mut Deck, n: usize) -> Result<Vec<Card>, OpponentError> {
    deck.draw(n).map_err(|e| OpponentError(e.to_string()))
}

fn indices_where(hand: &[Card], pred: impl Fn(&Card) -> bool) -> Vec<usize> {
    hand.iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

fn four_flush(hand: &[Card]) -> Option<Vec<usize>> {
    hand.iter().find_map(|c| {
        let same = indices_where(hand, |o| o.suit == c.suit);
        (same.len() == 4).then_some(same)
    })
}

/// Four consecutive ranks that can be completed at either end.
fn open_ended(hand: &[Card]) -> Option<Vec<usize>> {
    (2u8..=10).rev().find_map(|low| {
        // the run low..low+3 must leave room on both sides
        if low + 3 >= 14 {
            return None;
        }
        let mut picked = Vec::with_capacity(4);
        for r in low..low + 4 {
            let idx = hand.iter().position(|c| c.rank.value() == r)?;
            picked.push(idx);
        }
        picked.sort_unstable();
        Some(picked)
    })
}
