//! Client-facing projections of round and table documents.
//!
//! Stored documents carry the deck; views never do.

use chrono::{DateTime, Utc};
use gambit_engine::cards::Card;
use gambit_engine::hand::{Category, Comparison};
use gambit_engine::logger::Street;
use gambit_engine::player::{PlayerAction, TablePlayer};
use gambit_engine::pot::Pot;
use gambit_engine::round::{CombatRound, HpPools, RoundPhase, RoundState};
use gambit_engine::table::WageringTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub encounter_id: String,
    pub character_id: String,
    pub round_number: u32,
    pub hp: HpPools,
    pub phase: RoundPhase,
    /// Dealt hand while holding, final hand once resolved
    pub hand: Vec<Card>,
    pub held: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold: Option<HoldView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
    pub encounter_finished: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldView {
    pub rerolls_available: u32,
    pub peeks_available: u32,
    pub peeked: Option<Card>,
    pub timeout_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    pub category: Category,
    pub opponent_hand: Vec<Card>,
    pub opponent_category: Category,
    pub outcome: Comparison,
    pub damage_dealt: u32,
    pub damage_taken: u32,
    pub timed_out: bool,
    pub resolved_at: DateTime<Utc>,
}

impl From<&CombatRound> for RoundView {
    fn from(round: &CombatRound) -> Self {
        let (hand, held, hold, result) = match &round.state {
            RoundState::Drawing { .. } => (Vec::new(), Vec::new(), None, None),
            RoundState::Holding(h) => (
                h.hand.clone(),
                h.held.clone(),
                Some(HoldView {
                    rerolls_available: h.rerolls_available,
                    peeks_available: h.peeks_available,
                    peeked: h.peeked,
                    timeout_at: h.timeout_at,
                }),
                None,
            ),
            RoundState::Resolved(r) => (
                r.final_hand.clone(),
                r.held.clone(),
                None,
                Some(ResultView {
                    category: r.rank.category,
                    opponent_hand: r.opponent_hand.clone(),
                    opponent_category: r.opponent_rank.category,
                    outcome: r.outcome,
                    damage_dealt: r.damage_dealt,
                    damage_taken: r.damage_taken,
                    timed_out: r.timed_out,
                    resolved_at: r.resolved_at,
                }),
            ),
        };
        Self {
            encounter_id: round.encounter_id.clone(),
            character_id: round.character_id.clone(),
            round_number: round.round_number,
            hp: round.hp,
            phase: round.phase(),
            hand,
            held,
            hold,
            result,
            encounter_finished: round.encounter_finished(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub id: String,
    pub seat: usize,
    pub stack: u32,
    pub street_bet: u32,
    pub total_bet: u32,
    pub folded: bool,
    pub all_in: bool,
    pub in_hand: bool,
    pub sitting_out: bool,
    pub last_action: Option<PlayerAction>,
    /// Only present for the viewer's own seat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole: Option<Vec<Card>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub table_id: String,
    pub hand_number: u64,
    pub street: Option<Street>,
    pub board: Vec<Card>,
    pub pots: Vec<Pot>,
    pub pot_total: u32,
    pub current_bet: u32,
    pub min_raise: u32,
    pub dealer_seat: Option<usize>,
    pub small_blind_seat: Option<usize>,
    pub big_blind_seat: Option<usize>,
    pub to_act: Option<String>,
    pub players: Vec<SeatView>,
}

impl TableView {
    /// The table as seen by `viewer`; `None` reveals no hole cards.
    pub fn for_viewer(table: &WageringTable, viewer: Option<&str>) -> Self {
        let seat = |p: &TablePlayer| SeatView {
            id: p.id.clone(),
            seat: p.seat,
            stack: p.stack,
            street_bet: p.street_bet,
            total_bet: p.total_bet,
            folded: p.folded,
            all_in: p.all_in,
            in_hand: p.in_hand,
            sitting_out: p.sitting_out,
            last_action: p.last_action.clone(),
            hole: (viewer == Some(p.id.as_str()) && !p.hole.is_empty()).then(|| p.hole.clone()),
        };
        Self {
            table_id: table.table_id().to_string(),
            hand_number: table.hand_number(),
            street: table.street(),
            board: table.board().to_vec(),
            pots: table.pots(),
            pot_total: table.pot_total(),
            current_bet: table.current_bet(),
            min_raise: table.min_raise(),
            dealer_seat: table.dealer_seat(),
            small_blind_seat: table.small_blind_seat(),
            big_blind_seat: table.big_blind_seat(),
            to_act: table.to_act().map(|p| p.id.clone()),
            players: table.players().iter().map(seat).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_engine::deck::Deck;
    use gambit_engine::round::RoundConfig;
    use gambit_engine::table::Blinds;

    #[test]
    fn table_view_hides_other_players_hole_cards() {
        let mut table = WageringTable::new("t");
        table.seat_player("a", 100).unwrap();
        table.seat_player("b", 100).unwrap();
        table
            .start_hand_with_deck(Blinds::new(1, 2), Deck::new_with_seed(3))
            .unwrap();

        let view = TableView::for_viewer(&table, Some("a"));
        let a = view.players.iter().find(|p| p.id == "a").unwrap();
        let b = view.players.iter().find(|p| p.id == "b").unwrap();
        assert_eq!(a.hole.as_ref().map(Vec::len), Some(2));
        assert!(b.hole.is_none());
        assert_eq!(view.pot_total, 3);

        let json = serde_json::to_value(TableView::for_viewer(&table, None)).unwrap();
        assert!(json.get("deck").is_none());
        assert!(json["players"][0].get("hole").is_none());
    }

    #[test]
    fn round_view_tracks_phase() {
        let now = Utc::now();
        let mut round = CombatRound::drawing(
            "e",
            "c",
            1,
            RoundConfig::default(),
            HpPools {
                player: 50,
                opponent: 50,
            },
            Deck::new_with_seed(1),
        );
        assert!(RoundView::from(&round).hand.is_empty());
        round.deal(now, 2).unwrap();
        let view = RoundView::from(&round);
        assert_eq!(view.phase, RoundPhase::Hold);
        assert_eq!(view.hand.len(), 5);
        assert_eq!(view.hold.as_ref().unwrap().rerolls_available, 1);
        assert!(view.result.is_none());
    }
}
