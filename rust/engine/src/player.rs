use crate::cards::Card;
use serde::{Deserialize, Serialize};

/// Represents a player action during a betting round.
/// `Bet` and `Raise` name the target street total.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    /// Fold and forfeit the hand
    Fold,
    /// Check (no bet, only valid if no bet to call)
    Check,
    /// Call the current bet
    Call,
    /// Open the betting to the given total
    Bet(u32),
    /// Raise the current bet to the given total
    Raise(u32),
    /// Bet all remaining chips
    AllIn,
}

/// A seat at a [`crate::table::WageringTable`].
///
/// Players keep their seat for the table's lifetime; `sitting_out` marks
/// seats that are skipped when a hand starts.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TablePlayer {
    pub id: String,
    pub seat: usize,
    /// Current chip stack
    pub stack: u32,
    pub hole: Vec<Card>,
    /// Chips put in on the current street
    pub street_bet: u32,
    /// Chips put in over the whole hand
    pub total_bet: u32,
    pub folded: bool,
    pub all_in: bool,
    /// Dealt into the current hand
    pub in_hand: bool,
    pub sitting_out: bool,
    /// Acted since the last full raise on this street
    pub acted: bool,
    pub last_action: Option<PlayerAction>,
}

impl TablePlayer {
    pub fn new(id: impl Into<String>, seat: usize, stack: u32) -> Self {
        Self {
            id: id.into(),
            seat,
            stack,
            hole: Vec::new(),
            street_bet: 0,
            total_bet: 0,
            folded: false,
            all_in: false,
            in_hand: false,
            sitting_out: false,
            acted: false,
            last_action: None,
        }
    }

    /// Still contesting the pot.
    pub fn is_contending(&self) -> bool {
        self.in_hand && !self.folded
    }

    /// Can still take betting actions.
    pub fn can_act(&self) -> bool {
        self.is_contending() && !self.all_in
    }

    /// Moves up to `amount` chips from the stack into the pot and returns
    /// what was actually committed. Exhausting the stack flags all-in.
    pub fn commit(&mut self, amount: u32) -> u32 {
        let paid = amount.min(self.stack);
        self.stack -= paid;
        self.street_bet += paid;
        self.total_bet += paid;
        if self.stack == 0 && self.in_hand {
            self.all_in = true;
        }
        paid
    }

    pub(crate) fn reset_for_street(&mut self) {
        self.street_bet = 0;
        self.acted = false;
    }

    pub(crate) fn clear_hand(&mut self) {
        self.hole.clear();
        self.street_bet = 0;
        self.total_bet = 0;
        self.folded = false;
        self.all_in = false;
        self.in_hand = false;
        self.acted = false;
        self.last_action = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_caps_at_stack_and_flags_all_in() {
        let mut p = TablePlayer::new("p1", 0, 40);
        p.in_hand = true;
        assert_eq!(p.commit(100), 40);
        assert_eq!(p.stack, 0);
        assert!(p.all_in);
        assert_eq!(p.total_bet, 40);
        assert!(!p.can_act());
        assert!(p.is_contending());
    }

    #[test]
    fn actions_use_snake_case_on_the_wire() {
        let json = serde_json::to_string(&PlayerAction::Raise(60)).unwrap();
        assert_eq!(json, r#"{"raise":60}"#);
        let back: PlayerAction = serde_json::from_str(r#""all_in""#).unwrap();
        assert_eq!(back, PlayerAction::AllIn);
    }
}
