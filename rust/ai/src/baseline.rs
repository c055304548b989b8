//! Rule-based wagering policy for automated seats.
//!
//! Deterministic: the same table state always yields the same action, which
//! keeps simulator runs reproducible from their seed.

use crate::TablePolicy;
use gambit_engine::cards::Card;
use gambit_engine::hand::{Category, evaluate};
use gambit_engine::logger::Street;
use gambit_engine::player::PlayerAction;
use gambit_engine::table::WageringTable;

/// Baseline policy.
///
/// **Preflop:** strength from a starting-hand table (pairs, broadways,
/// suited connectors). **Postflop:** strength from the made hand category,
/// with a bump for high kickers. Strong hands bet or raise, medium hands call
/// when the price is right, weak hands check or fold.
#[derive(Debug, Clone, Default)]
pub struct BaselinePolicy;

/// The betting situation of the seat to act.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Spot {
    pub to_call: u32,
    pub current_bet: u32,
    pub street_bet: u32,
    pub min_raise: u32,
    pub stack: u32,
    pub pot: u32,
}

impl BaselinePolicy {
    pub fn new() -> Self {
        Self
    }

    /// Starting-hand strength on a 0-10 scale.
    pub fn preflop_strength(hole: [Card; 2]) -> u8 {
        let (a, b) = (hole[0].rank.value(), hole[1].rank.value());
        let (high, low) = (a.max(b), a.min(b));
        let suited = hole[0].suit == hole[1].suit;
        let pick = |s: u8, o: u8| if suited { s } else { o };

        if high == low {
            return match high {
                13..=14 => 10,
                11..=12 => 9,
                10 => 8,
                9 => 7,
                8 => 6,
                7 => 5,
                _ => 4,
            };
        }
        match (high, low) {
            (14, 13) => pick(10, 8),
            (14, 12) => pick(8, 7),
            (14, 11) => pick(7, 6),
            (14, 10) => pick(6, 5),
            (14, _) => pick(5, 4),
            (13, 12) => pick(7, 6),
            (13, 11) | (12, 11) => pick(6, 5),
            (13, 10) | (12, 10) => pick(5, 4),
            _ if suited && high - low <= 2 => {
                if high >= 9 {
                    5
                } else {
                    4
                }
            }
            _ if high >= 11 && low >= 9 => 4,
            _ => 2,
        }
    }

    /// Made-hand strength on a 0-10 scale, `None` before the flop.
    pub fn postflop_strength(hole: [Card; 2], board: &[Card]) -> Option<u8> {
        if board.len() < 3 {
            return None;
        }
        let mut cards = hole.to_vec();
        cards.extend_from_slice(board);
        let rank = evaluate(&cards).ok()?;
        let base = match rank.category {
            Category::HighCard => 1,
            Category::OnePair => 3,
            Category::TwoPair => 5,
            Category::ThreeOfAKind => 6,
            Category::Straight => 7,
            Category::Flush => 8,
            Category::FullHouse => 9,
            Category::FourOfAKind | Category::StraightFlush | Category::RoyalFlush => 10,
        };
        let kicker = u8::from(rank.kickers[0] >= 12);
        Some((base + kicker).min(10))
    }

    /// Share of the final pot a call buys, `pot / (pot + call)`.
    pub fn pot_odds(pot: u32, call: u32) -> f32 {
        if call == 0 {
            return 1.0;
        }
        pot as f32 / (pot as f32 + call as f32)
    }

    /// The action for a spot at the given strength.
    ///
    /// Bet and raise sizes are street totals, clamped to what the stack allows.
    pub fn decide_spot(strength: u8, spot: Spot) -> PlayerAction {
        let max_total = spot.street_bet + spot.stack;
        let min_total = spot.current_bet + spot.min_raise.max(1);
        let sized = |extra: u32| -> PlayerAction {
            let target = (spot.current_bet + extra).max(min_total);
            if target >= max_total {
                PlayerAction::AllIn
            } else if spot.current_bet == 0 {
                PlayerAction::Bet(target)
            } else {
                PlayerAction::Raise(target)
            }
        };

        if spot.to_call == 0 {
            return match strength {
                9..=10 => sized(spot.pot * 2 / 3),
                7..=8 => sized(spot.pot / 2),
                _ => PlayerAction::Check,
            };
        }

        if spot.to_call >= spot.stack {
            return if strength >= 7 {
                PlayerAction::AllIn
            } else {
                PlayerAction::Fold
            };
        }

        let odds = Self::pot_odds(spot.pot, spot.to_call);
        match strength {
            9..=10 if max_total > min_total => sized(spot.pot / 2),
            7..=10 => PlayerAction::Call,
            5..=6 if odds >= 0.7 || spot.to_call <= spot.pot / 4 => PlayerAction::Call,
            3..=4 if odds >= 0.8 || spot.to_call <= spot.pot / 6 => PlayerAction::Call,
            _ => PlayerAction::Fold,
        }
    }
}

impl TablePolicy for BaselinePolicy {
    fn decide(&self, table: &WageringTable, player_id: &str) -> PlayerAction {
        let Some(player) = table.player(player_id) else {
            return PlayerAction::Fold;
        };
        let to_call = table.to_call(player_id);
        let hole: [Card; 2] = match player.hole.as_slice() {
            [a, b] => [*a, *b],
            _ => {
                return if to_call == 0 {
                    PlayerAction::Check
                } else {
                    PlayerAction::Fold
                };
            }
        };
        let strength = match table.street() {
            Some(Street::Preflop) | None => Self::preflop_strength(hole),
            Some(_) => Self::postflop_strength(hole, table.board())
                .unwrap_or_else(|| Self::preflop_strength(hole)),
        };
        let spot = Spot {
            to_call,
            current_bet: table.current_bet(),
            street_bet: player.street_bet,
            min_raise: table.min_raise(),
            stack: player.stack,
            pot: table.pot_total(),
        };
        Self::decide_spot(strength, spot)
    }

    fn name(&self) -> &str {
        "BaselinePolicy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_engine::cards::parse_cards;
    use gambit_engine::deck::Deck;
    use gambit_engine::rules::validate_action;
    use gambit_engine::table::Blinds;

    fn hole(text: &str) -> [Card; 2] {
        let cards = parse_cards(text).unwrap();
        [cards[0], cards[1]]
    }

    #[test]
    fn preflop_table() {
        assert_eq!(BaselinePolicy::preflop_strength(hole("Ah As")), 10);
        assert_eq!(BaselinePolicy::preflop_strength(hole("Kh Ks")), 10);
        assert_eq!(BaselinePolicy::preflop_strength(hole("Ah Kh")), 10);
        assert_eq!(BaselinePolicy::preflop_strength(hole("Ah Ks")), 8);
        assert!(BaselinePolicy::preflop_strength(hole("7h 2s")) <= 3);
        assert!((4..=6).contains(&BaselinePolicy::preflop_strength(hole("9h 8h"))));
    }

    #[test]
    fn postflop_uses_the_board() {
        let board = parse_cards("Ad Kc Qh Js Td").unwrap();
        let s = BaselinePolicy::postflop_strength(hole("Ah As"), &board).unwrap();
        assert!(s >= 7);
        assert_eq!(BaselinePolicy::postflop_strength(hole("Ah As"), &board[..2]), None);
    }

    #[test]
    fn pot_odds() {
        assert!((BaselinePolicy::pot_odds(100, 50) - 0.667).abs() < 0.01);
        assert_eq!(BaselinePolicy::pot_odds(100, 0), 1.0);
    }

    #[test]
    fn strong_hand_opens_with_a_legal_bet() {
        let spot = Spot {
            to_call: 0,
            current_bet: 0,
            street_bet: 0,
            min_raise: 10,
            stack: 500,
            pot: 60,
        };
        let action = BaselinePolicy::decide_spot(10, spot);
        assert_eq!(action, PlayerAction::Bet(40));
        assert!(validate_action(500, 0, 0, 10, action).is_ok());
    }

    #[test]
    fn weak_hand_folds_to_a_big_bet() {
        let spot = Spot {
            to_call: 100,
            current_bet: 100,
            street_bet: 0,
            min_raise: 100,
            stack: 500,
            pot: 120,
        };
        assert_eq!(BaselinePolicy::decide_spot(2, spot), PlayerAction::Fold);
    }

    #[test]
    fn policy_actions_are_always_legal() {
        let policy = BaselinePolicy::new();
        for seed in 0..20 {
            let mut t = WageringTable::new("sim");
            for (i, s) in [300u32, 200, 100].iter().enumerate() {
                t.seat_player(format!("p{i}"), *s).unwrap();
            }
            t.start_hand_with_deck(Blinds::new(5, 10), Deck::new_with_seed(seed))
                .unwrap();
            while let Some(p) = t.to_act() {
                let id = p.id.clone();
                let action = policy.decide(&t, &id);
                t.act(&id, action.clone())
                    .unwrap_or_else(|e| panic!("seed {seed}: {action:?} rejected: {e}"));
            }
            t.resolve_showdown().unwrap();
            assert_eq!(t.chip_total(), 600);
        }
    }
}
