use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Suit};
use crate::errors::EvalError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
    RoyalFlush = 9,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::HighCard => "High Card",
            Category::OnePair => "One Pair",
            Category::TwoPair => "Two Pair",
            Category::ThreeOfAKind => "Three of a Kind",
            Category::Straight => "Straight",
            Category::Flush => "Flush",
            Category::FullHouse => "Full House",
            Category::FourOfAKind => "Four of a Kind",
            Category::StraightFlush => "Straight Flush",
            Category::RoyalFlush => "Royal Flush",
        }
    }

    /// Damage scaling in percent of the base damage.
    pub fn damage_percent(self) -> u32 {
        match self {
            Category::HighCard => 100,
            Category::OnePair => 150,
            Category::TwoPair => 200,
            Category::ThreeOfAKind => 300,
            Category::Straight => 400,
            Category::Flush => 500,
            Category::FullHouse => 600,
            Category::FourOfAKind => 800,
            Category::StraightFlush => 1000,
            Category::RoyalFlush => 1500,
        }
    }
}

/// Evaluated five-card hand.
///
/// `kickers` holds the rank values that decide the hand, ordered high to low
/// (for straights only the top card). `cards` are the five cards that made the
/// hand, ordered by significance: bigger groups first, then rank, then suit.
///
/// The derived ordering is total. Two hands with equal category and kickers
/// are ordered by the suits of their significant cards, which only serves to
/// make sorting deterministic; [`compare`] reports those hands as a tie.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct HandRank {
    pub category: Category,
    // kickers: ordered high -> low for tiebreaks
    pub kickers: [u8; 5],
    pub cards: [Card; 5],
}

impl HandRank {
    pub fn strength(&self) -> (Category, [u8; 5]) {
        (self.category, self.kickers)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AWins,
    BWins,
    Tie,
}

/// Evaluates 5, 6 or 7 cards and returns the best five-card hand.
///
/// Pure and deterministic: the same multiset of cards always yields the same
/// [`HandRank`], whatever order the cards arrive in.
pub fn evaluate(cards: &[Card]) -> Result<HandRank, EvalError> {
    if !(5..=7).contains(&cards.len()) {
        return Err(EvalError::WrongCardCount(cards.len()));
    }
    let mut sorted = cards.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(EvalError::DuplicateCard(pair[0]));
    }

    let n = sorted.len();
    let mut best: Option<HandRank> = None;
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    for e in d + 1..n {
                        let rank =
                            evaluate_five([sorted[a], sorted[b], sorted[c], sorted[d], sorted[e]]);
                        if best.as_ref().is_none_or(|current| rank > *current) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }
    best.ok_or(EvalError::WrongCardCount(n))
}

/// Total order on hand strength used for showdowns and combat scaling.
/// Suits never decide: equal category and kickers is a [`Comparison::Tie`].
pub fn compare(a: &HandRank, b: &HandRank) -> Comparison {
    match compare_hands(a, b) {
        Ordering::Greater => Comparison::AWins,
        Ordering::Less => Comparison::BWins,
        Ordering::Equal => Comparison::Tie,
    }
}

pub fn compare_hands(a: &HandRank, b: &HandRank) -> Ordering {
    match a.category.cmp(&b.category) {
        Ordering::Equal => a.kickers.cmp(&b.kickers),
        ord => ord,
    }
}

/// Damage dealt by a hand: `base_damage` scaled by the category's damage
/// percent and by `bonus_multiplier`, rounded to the nearest point.
///
/// A non-finite or non-positive multiplier deals no damage.
pub fn rank_to_damage(rank: &HandRank, base_damage: u32, bonus_multiplier: f64) -> u32 {
    if !bonus_multiplier.is_finite() || bonus_multiplier <= 0.0 {
        return 0;
    }
    let scaled = f64::from(base_damage) * f64::from(rank.category.damage_percent()) / 100.0;
    let damage = (scaled * bonus_multiplier).round();
    if damage >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        damage as u32
    }
}

fn evaluate_five(cards: [Card; 5]) -> HandRank {
    let mut rank_counts = [0u8; 15]; // 2..14 used
    let mut rank_mask: u16 = 0;
    for c in cards.iter() {
        let r = c.rank.value();
        rank_counts[r as usize] += 1;
        rank_mask |= 1u16 << r;
    }
    let flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight_high = if rank_mask.count_ones() == 5 {
        straight_high_from_mask(rank_mask)
    } else {
        None
    };

    // (count, rank) groups: bigger groups first, then higher rank
    let mut groups: Vec<(u8, u8)> = (2..=14u8)
        .rev()
        .filter(|&r| rank_counts[r as usize] > 0)
        .map(|r| (rank_counts[r as usize], r))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));

    let category = match (straight_high, flush) {
        (Some(14), true) => Category::RoyalFlush,
        (Some(_), true) => Category::StraightFlush,
        _ if groups[0].0 == 4 => Category::FourOfAKind,
        _ if groups[0].0 == 3 && groups[1].0 == 2 => Category::FullHouse,
        (_, true) => Category::Flush,
        (Some(_), false) => Category::Straight,
        _ if groups[0].0 == 3 => Category::ThreeOfAKind,
        _ if groups[0].0 == 2 && groups[1].0 == 2 => Category::TwoPair,
        _ if groups[0].0 == 2 => Category::OnePair,
        _ => Category::HighCard,
    };

    let mut kickers = [0u8; 5];
    match straight_high {
        Some(high) if matches!(category, Category::Straight | Category::StraightFlush | Category::RoyalFlush) => {
            kickers[0] = high;
        }
        _ => {
            for (slot, &(_, r)) in kickers.iter_mut().zip(groups.iter()) {
                *slot = r;
            }
        }
    }

    let wheel = straight_high == Some(5);
    let significance = |c: &Card| -> (u8, u8, Suit) {
        let mut r = c.rank.value();
        if wheel && r == 14 {
            r = 1;
        }
        (rank_counts[c.rank.value() as usize], r, c.suit)
    };
    let mut ordered = cards;
    ordered.sort_by(|a, b| significance(b).cmp(&significance(a)));

    HandRank {
        category,
        kickers,
        cards: ordered,
    }
}

fn straight_high_from_mask(mask: u16) -> Option<u8> {
    // Treat Ace as 14 and optionally as 1
    let mut m = mask;
    if (m & (1 << 14)) != 0 {
        m |= 1 << 1;
    }
    // Sliding 5-bit window from Ace(14) down to 5
    for high in (5..=14u8).rev() {
        let window = 0b11111u16 << (high - 4);
        if (m & window) == window {
            return Some(high);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_cards;

    fn rank_of(text: &str) -> HandRank {
        evaluate(&parse_cards(text).unwrap()).unwrap()
    }

    #[test]
    fn wheel_is_five_high_with_ace_last() {
        let hr = rank_of("Ah 2c 3d 4s 5h");
        assert_eq!(hr.category, Category::Straight);
        assert_eq!(hr.kickers[0], 5);
        assert_eq!(hr.cards[4].to_string(), "Ah");
    }

    #[test]
    fn six_high_straight_beats_wheel() {
        let wheel = rank_of("Ah 2c 3d 4s 5h");
        let six = rank_of("2c 3d 4s 5h 6c");
        assert_eq!(compare(&six, &wheel), Comparison::AWins);
    }

    #[test]
    fn suits_never_decide_compare_but_do_order() {
        let hearts = rank_of("Ah Kh 9c 7d 4s");
        let spades = rank_of("As Kc 9d 7h 4c");
        assert_eq!(compare(&hearts, &spades), Comparison::Tie);
        assert_ne!(hearts.cmp(&spades), Ordering::Equal);
    }

    #[test]
    fn significant_cards_lead_with_the_group() {
        let hr = rank_of("2c Kd Ks 9h Kh");
        assert_eq!(hr.category, Category::ThreeOfAKind);
        assert_eq!(hr.kickers, [13, 9, 2, 0, 0]);
        assert!(hr.cards[..3].iter().all(|c| c.rank.value() == 13));
    }

    #[test]
    fn damage_scales_with_category_and_bonus() {
        let pair = rank_of("Ah Ac 9c 7d 4s");
        assert_eq!(rank_to_damage(&pair, 10, 1.0), 15);
        assert_eq!(rank_to_damage(&pair, 10, 2.0), 30);
        let royal = rank_of("Ah Kh Qh Jh Th");
        assert_eq!(royal.category, Category::RoyalFlush);
        assert_eq!(rank_to_damage(&royal, 10, 1.0), 150);
        assert_eq!(rank_to_damage(&royal, 10, 0.0), 0);
        assert_eq!(rank_to_damage(&royal, 10, f64::NAN), 0);
    }

    #[test]
    fn rejects_bad_card_counts_and_duplicates() {
        let four = parse_cards("Ah Kh Qh Jh").unwrap();
        assert_eq!(evaluate(&four), Err(EvalError::WrongCardCount(4)));
        let dup = parse_cards("Ah Ah Qh Jh Th").unwrap();
        assert!(matches!(evaluate(&dup), Err(EvalError::DuplicateCard(_))));
    }
}
