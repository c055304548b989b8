use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::TableError;
use crate::hand::{compare_hands, evaluate, HandRank};
use crate::logger::{
    format_hand_id, ActionRecord, HandRecord, PotAward, ShowdownInfo, ShownHand, Street,
};
use crate::player::{PlayerAction, TablePlayer};
use crate::pot::{order_from_dealer, split_pot, Contribution, Pot, PotManager};
use crate::rules::{validate_action, ValidatedAction};
use std::cmp::Ordering;

/// Maximum number of seats at one table.
pub const MAX_SEATS: usize = 10;

/// Forced bets for one hand.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Blinds {
    pub small: u32,
    pub big: u32,
    #[serde(default)]
    pub ante: u32,
}

impl Blinds {
    pub fn new(small: u32, big: u32) -> Self {
        Self { small, big, ante: 0 }
    }

    pub fn with_ante(mut self, ante: u32) -> Self {
        self.ante = ante;
        self
    }
}

/// What an accepted action did to the hand.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ActionOutcome {
    pub street_before: Street,
    pub street_after: Street,
}

impl ActionOutcome {
    pub fn street_advanced(&self) -> bool {
        self.street_before != self.street_after
    }

    pub fn showdown_reached(&self) -> bool {
        self.street_after == Street::Showdown
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub player_id: String,
    pub amount: u32,
}

/// Result of [`WageringTable::resolve_showdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowdownResult {
    pub hand_number: u64,
    pub uncontested: bool,
    pub payouts: Vec<Payout>,
    /// Evaluated hands of every contender, empty when uncontested
    pub hands: Vec<(String, HandRank)>,
    pub record: HandRecord,
}

/// A multi-player wagering table.
///
/// The whole table, deck included, is plain data so it can be persisted as
/// one document and reloaded by any instance. Every mutating operation works
/// on a copy and only replaces `self` once it has fully succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageringTable {
    table_id: String,
    players: Vec<TablePlayer>,
    dealer: Option<usize>,
    small_blind_seat: Option<usize>,
    big_blind_seat: Option<usize>,
    blinds: Option<Blinds>,
    deck: Deck,
    board: Vec<Card>,
    street: Option<Street>,
    current_bet: u32,
    min_raise: u32,
    to_act: Option<usize>,
    hand_number: u64,
    actions: Vec<ActionRecord>,
    hand_start_chips: u64,
}

impl WageringTable {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            players: Vec::new(),
            dealer: None,
            small_blind_seat: None,
            big_blind_seat: None,
            blinds: None,
            deck: Deck::ordered(),
            board: Vec::new(),
            street: None,
            current_bet: 0,
            min_raise: 0,
            to_act: None,
            hand_number: 0,
            actions: Vec::new(),
            hand_start_chips: 0,
        }
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }
    pub fn players(&self) -> &[TablePlayer] {
        &self.players
    }
    pub fn player(&self, id: &str) -> Option<&TablePlayer> {
        self.players.iter().find(|p| p.id == id)
    }
    pub fn board(&self) -> &[Card] {
        &self.board
    }
    /// Current street, `None` between hands.
    pub fn street(&self) -> Option<Street> {
        self.street
    }
    pub fn current_bet(&self) -> u32 {
        self.current_bet
    }
    pub fn min_raise(&self) -> u32 {
        self.min_raise
    }
    pub fn dealer_seat(&self) -> Option<usize> {
        self.dealer
    }
    pub fn small_blind_seat(&self) -> Option<usize> {
        self.small_blind_seat
    }
    pub fn big_blind_seat(&self) -> Option<usize> {
        self.big_blind_seat
    }
    pub fn blinds(&self) -> Option<Blinds> {
        self.blinds
    }
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }
    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }
    pub fn deck_remaining(&self) -> usize {
        self.deck.remaining()
    }
    pub fn hand_in_progress(&self) -> bool {
        self.street.is_some()
    }

    /// The player whose turn it is.
    pub fn to_act(&self) -> Option<&TablePlayer> {
        self.to_act.and_then(|seat| self.players.iter().find(|p| p.seat == seat))
    }

    /// Chips `id` must add to stay in the hand.
    pub fn to_call(&self, id: &str) -> u32 {
        self.player(id)
            .map(|p| self.current_bet.saturating_sub(p.street_bet).min(p.stack))
            .unwrap_or(0)
    }

    /// Stacks plus chips committed to the current hand.
    pub fn chip_total(&self) -> u64 {
        self.players
            .iter()
            .map(|p| u64::from(p.stack) + u64::from(p.total_bet))
            .sum()
    }

    /// Main pot followed by side pots, computed from the contributions so far.
    pub fn pots(&self) -> Vec<Pot> {
        PotManager::from_entries(&self.contributions()).into_pots()
    }

    pub fn pot_total(&self) -> u32 {
        self.players.iter().map(|p| p.total_bet).sum()
    }

    /// Seats a player at the lowest free seat and returns it.
    pub fn seat_player(&mut self, id: impl Into<String>, stack: u32) -> Result<usize, TableError> {
        let id = id.into();
        if self.street.is_some() {
            return Err(TableError::HandInProgress);
        }
        if self.player(&id).is_some() {
            return Err(TableError::AlreadySeated(id));
        }
        let seat = (0..MAX_SEATS)
            .find(|s| self.players.iter().all(|p| p.seat != *s))
            .ok_or(TableError::TableFull(MAX_SEATS))?;
        // pots and payouts are u32, so the whole table must fit in one
        let total = self.chip_total() + u64::from(stack);
        if total > u64::from(u32::MAX) {
            return Err(TableError::ChipLimit {
                total,
                limit: u32::MAX,
            });
        }
        self.players.push(TablePlayer::new(id, seat, stack));
        self.players.sort_by_key(|p| p.seat);
        Ok(seat)
    }

    pub fn remove_player(&mut self, id: &str) -> Result<TablePlayer, TableError> {
        if self.street.is_some() {
            return Err(TableError::HandInProgress);
        }
        let idx = self.index_of(id)?;
        Ok(self.players.remove(idx))
    }

    /// Marks a seat as skipped (or no longer skipped) from the next hand on.
    pub fn set_sitting_out(&mut self, id: &str, sitting_out: bool) -> Result<(), TableError> {
        let idx = self.index_of(id)?;
        self.players[idx].sitting_out = sitting_out;
        Ok(())
    }

    /// Starts a hand with a freshly shuffled deck.
    pub fn start_hand(&mut self, blinds: Blinds) -> Result<(), TableError> {
        self.start_hand_with_deck(blinds, Deck::new_shuffled())
    }

    /// Starts a hand dealing from `deck`, used for replays and tests.
    pub fn start_hand_with_deck(&mut self, blinds: Blinds, deck: Deck) -> Result<(), TableError> {
        if self.street.is_some() {
            return Err(TableError::HandInProgress);
        }
        if blinds.small == 0 || blinds.big == 0 || blinds.small > blinds.big {
            return Err(TableError::InvalidBlinds {
                small: blinds.small,
                big: blinds.big,
            });
        }
        let eligible: Vec<usize> = self
            .players
            .iter()
            .filter(|p| !p.sitting_out && p.stack > 0)
            .map(|p| p.seat)
            .collect();
        if eligible.len() < 2 {
            return Err(TableError::NotEnoughPlayers(eligible.len()));
        }

        let mut next = self.clone();
        next.deck = deck;
        next.board.clear();
        next.actions.clear();
        next.blinds = Some(blinds);
        for p in next.players.iter_mut() {
            p.clear_hand();
            p.in_hand = eligible.contains(&p.seat);
        }
        next.hand_start_chips = next.chip_total();

        let is_live = |p: &TablePlayer| p.in_hand;
        let dealer = match next.dealer {
            Some(d) => next.next_seat_where(d, is_live),
            None => next.players.iter().find(|p| p.in_hand).map(|p| p.seat),
        }
        .ok_or(TableError::NotEnoughPlayers(eligible.len()))?;
        let (sb, bb) = if eligible.len() == 2 {
            let bb = next
                .next_seat_where(dealer, is_live)
                .ok_or(TableError::NotEnoughPlayers(eligible.len()))?;
            (dealer, bb)
        } else {
            let sb = next
                .next_seat_where(dealer, is_live)
                .ok_or(TableError::NotEnoughPlayers(eligible.len()))?;
            let bb = next
                .next_seat_where(sb, is_live)
                .ok_or(TableError::NotEnoughPlayers(eligible.len()))?;
            (sb, bb)
        };
        next.dealer = Some(dealer);
        next.small_blind_seat = Some(sb);
        next.big_blind_seat = Some(bb);

        // two rounds of hole cards starting left of the dealer
        let mut deal_order = eligible.clone();
        order_from_dealer(&mut deal_order, dealer, MAX_SEATS);
        for _ in 0..2 {
            for &seat in &deal_order {
                let card = next.deck.draw(1)?;
                let idx = next.index_of_seat(seat)?;
                next.players[idx].hole.extend(card);
            }
        }

        if blinds.ante > 0 {
            for p in next.players.iter_mut().filter(|p| p.in_hand) {
                p.commit(blinds.ante);
                // antes are dead money, not part of the street bet
                p.street_bet = 0;
            }
        }
        let sb_idx = next.index_of_seat(sb)?;
        next.players[sb_idx].commit(blinds.small);
        let bb_idx = next.index_of_seat(bb)?;
        next.players[bb_idx].commit(blinds.big);

        next.street = Some(Street::Preflop);
        next.current_bet = blinds.big;
        next.min_raise = blinds.big;
        next.hand_number += 1;
        next.to_act = next.next_seat_where(bb, TablePlayer::can_act);
        next.settle()?;
        next.check_conservation()?;
        *self = next;
        Ok(())
    }

    /// Applies one betting action for `player_id`.
    ///
    /// Rejected actions leave the table untouched.
    pub fn act(&mut self, player_id: &str, action: PlayerAction) -> Result<ActionOutcome, TableError> {
        let street = match self.street {
            None => return Err(TableError::NoHandInProgress),
            Some(Street::Showdown) => return Err(TableError::ShowdownPending),
            Some(s) => s,
        };
        let idx = self.index_of(player_id)?;
        let player = &self.players[idx];
        if !player.in_hand || player.folded {
            return Err(TableError::PlayerAlreadyFolded);
        }
        if player.all_in {
            return Err(TableError::PlayerAllIn);
        }
        if self.to_act != Some(player.seat) {
            let expected = self
                .to_act()
                .map(|p| p.id.clone())
                .unwrap_or_default();
            return Err(TableError::NotPlayersTurn {
                expected,
                actual: player_id.to_string(),
            });
        }
        let validated = validate_action(
            player.stack,
            player.street_bet,
            self.current_bet,
            self.min_raise,
            action.clone(),
        )?;

        let mut next = self.clone();
        let seat = next.players[idx].seat;
        let recorded = match validated {
            ValidatedAction::AllIn(_) => PlayerAction::AllIn,
            _ => action,
        };
        match validated {
            ValidatedAction::Fold => next.players[idx].folded = true,
            ValidatedAction::Check => {}
            ValidatedAction::Call(c) => {
                next.players[idx].commit(c);
            }
            ValidatedAction::Bet(c) | ValidatedAction::Raise(c) | ValidatedAction::AllIn(c) => {
                next.players[idx].commit(c);
                let new_total = next.players[idx].street_bet;
                if new_total > next.current_bet {
                    let raise = new_total - next.current_bet;
                    if raise >= next.min_raise {
                        next.min_raise = raise;
                    }
                    next.current_bet = new_total;
                    // everyone else must respond again, short all-ins included
                    for (i, p) in next.players.iter_mut().enumerate() {
                        if i != idx {
                            p.acted = false;
                        }
                    }
                }
            }
        }
        next.players[idx].acted = true;
        next.players[idx].last_action = Some(recorded.clone());
        next.actions.push(ActionRecord {
            player_id: player_id.to_string(),
            street,
            action: recorded,
        });

        next.to_act = next.next_seat_where(seat, TablePlayer::can_act);
        next.settle()?;
        next.check_conservation()?;
        let street_after = next.street.unwrap_or(Street::Showdown);
        *self = next;
        Ok(ActionOutcome {
            street_before: street,
            street_after,
        })
    }

    /// Distributes the pots and clears the hand.
    ///
    /// A lone contender takes everything uncontested. Otherwise each pot goes
    /// to the best hands among its eligible seats, split evenly on ties with
    /// the odd chips to the first winner after the dealer.
    pub fn resolve_showdown(&mut self) -> Result<ShowdownResult, TableError> {
        match self.street {
            None => return Err(TableError::NoHandInProgress),
            Some(Street::Showdown) => {}
            Some(s) => return Err(TableError::ShowdownNotReady(s)),
        }
        let mut next = self.clone();
        let dealer = next.dealer.unwrap_or(0);
        let contenders: Vec<usize> = next
            .players
            .iter()
            .filter(|p| p.is_contending())
            .map(|p| p.seat)
            .collect();
        let pot_total = next.pot_total();

        let mut credited: Vec<(usize, u32)> = Vec::new();
        let mut awards = Vec::new();
        let mut hands: Vec<(usize, HandRank)> = Vec::new();
        let uncontested = contenders.len() == 1;

        if uncontested {
            credited.push((contenders[0], pot_total));
            awards.push((0, pot_total, vec![contenders[0]]));
        } else {
            for &seat in &contenders {
                let p = &next.players[next.index_of_seat(seat)?];
                let mut cards = p.hole.clone();
                cards.extend_from_slice(&next.board);
                hands.push((seat, evaluate(&cards)?));
            }
            for (pot_index, pot) in next.pots().into_iter().enumerate() {
                let mut best: Option<&HandRank> = None;
                for (seat, rank) in &hands {
                    if !pot.eligible.contains(seat) {
                        continue;
                    }
                    if best.is_none_or(|b| compare_hands(rank, b) == Ordering::Greater) {
                        best = Some(rank);
                    }
                }
                let Some(best) = best else { continue };
                let mut winners: Vec<usize> = hands
                    .iter()
                    .filter(|(seat, rank)| {
                        pot.eligible.contains(seat) && compare_hands(rank, best) == Ordering::Equal
                    })
                    .map(|(seat, _)| *seat)
                    .collect();
                order_from_dealer(&mut winners, dealer, MAX_SEATS);
                credited.extend(split_pot(pot.amount, &winners));
                awards.push((pot_index, pot.amount, winners));
            }
        }

        let paid: u64 = credited.iter().map(|(_, a)| u64::from(*a)).sum();
        if paid != u64::from(pot_total) {
            return Err(TableError::ChipConservation {
                expected: u64::from(pot_total),
                found: paid,
            });
        }

        let mut payouts: Vec<Payout> = Vec::new();
        for (seat, amount) in credited {
            let idx = next.index_of_seat(seat)?;
            next.players[idx].stack += amount;
            let id = next.players[idx].id.clone();
            match payouts.iter_mut().find(|p| p.player_id == id) {
                Some(existing) => existing.amount += amount,
                None => payouts.push(Payout {
                    player_id: id,
                    amount,
                }),
            }
        }

        let id_of = |seat: usize| -> String {
            next.players
                .iter()
                .find(|p| p.seat == seat)
                .map(|p| p.id.clone())
                .unwrap_or_default()
        };
        let record = HandRecord {
            hand_id: format_hand_id(&next.table_id, next.hand_number),
            table_id: next.table_id.clone(),
            actions: next.actions.clone(),
            board: next.board.clone(),
            awards: awards
                .iter()
                .map(|(pot_index, amount, winners)| PotAward {
                    pot_index: *pot_index,
                    amount: *amount,
                    winners: winners.iter().map(|s| id_of(*s)).collect(),
                })
                .collect(),
            ts: None,
            showdown: if uncontested {
                None
            } else {
                Some(ShowdownInfo {
                    hands: hands
                        .iter()
                        .map(|(seat, rank)| ShownHand {
                            player_id: id_of(*seat),
                            category: rank.category,
                            cards: rank.cards.to_vec(),
                        })
                        .collect(),
                })
            },
        };
        let hands = hands
            .into_iter()
            .map(|(seat, rank)| (id_of(seat), rank))
            .collect();

        for p in next.players.iter_mut() {
            p.clear_hand();
        }
        next.street = None;
        next.board.clear();
        next.current_bet = 0;
        next.min_raise = 0;
        next.to_act = None;
        if next.chip_total() != next.hand_start_chips {
            return Err(TableError::ChipConservation {
                expected: next.hand_start_chips,
                found: next.chip_total(),
            });
        }

        let result = ShowdownResult {
            hand_number: next.hand_number,
            uncontested,
            payouts,
            hands,
            record,
        };
        *self = next;
        Ok(result)
    }

    fn contributions(&self) -> Vec<Contribution> {
        self.players
            .iter()
            .filter(|p| p.total_bet > 0)
            .map(|p| Contribution {
                seat: p.seat,
                amount: p.total_bet,
                folded: !p.is_contending(),
            })
            .collect()
    }

    fn index_of(&self, id: &str) -> Result<usize, TableError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| TableError::PlayerNotSeated(id.to_string()))
    }

    fn index_of_seat(&self, seat: usize) -> Result<usize, TableError> {
        self.players
            .iter()
            .position(|p| p.seat == seat)
            .ok_or_else(|| TableError::PlayerNotSeated(format!("seat {seat}")))
    }

    /// First seat clockwise after `after` matching `pred`, wrapping around.
    fn next_seat_where(&self, after: usize, pred: impl Fn(&TablePlayer) -> bool) -> Option<usize> {
        self.players
            .iter()
            .find(|p| p.seat > after && pred(p))
            .or_else(|| self.players.iter().find(|p| pred(p)))
            .map(|p| p.seat)
    }

    fn betting_closed(&self) -> bool {
        let actors: Vec<&TablePlayer> = self.players.iter().filter(|p| p.can_act()).collect();
        match actors.as_slice() {
            [] => true,
            [only] => only.street_bet >= self.current_bet,
            _ => actors
                .iter()
                .all(|p| p.acted && p.street_bet == self.current_bet),
        }
    }

    /// Advances streets while the betting round is closed.
    fn settle(&mut self) -> Result<(), TableError> {
        loop {
            let Some(street) = self.street else {
                return Ok(());
            };
            let contenders = self.players.iter().filter(|p| p.is_contending()).count();
            if contenders <= 1 || street == Street::River && self.betting_closed() {
                self.street = Some(Street::Showdown);
                self.to_act = None;
                return Ok(());
            }
            if !self.betting_closed() {
                return Ok(());
            }

            let next_street = street.next();
            self.deck.burn_card()?;
            let dealt = self.deck.draw(next_street.cards_dealt())?;
            self.board.extend(dealt);
            for p in self.players.iter_mut() {
                p.reset_for_street();
            }
            self.street = Some(next_street);
            self.current_bet = 0;
            self.min_raise = self.blinds.map(|b| b.big).unwrap_or(1);
            let dealer = self.dealer.unwrap_or(0);
            self.to_act = self.next_seat_where(dealer, TablePlayer::can_act);
        }
    }

    fn check_conservation(&self) -> Result<(), TableError> {
        let found = self.chip_total();
        if found != self.hand_start_chips {
            return Err(TableError::ChipConservation {
                expected: self.hand_start_chips,
                found,
            });
        }
        Ok(())
    }
}
