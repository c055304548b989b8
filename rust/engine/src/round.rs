//! Hold/discard combat round.
//!
//! A round deals five cards, lets the player hold some of them (optionally
//! peeking at the next card or rerolling the unheld ones), then replaces the
//! unheld cards, scores both hands and applies damage. The phase is encoded
//! in [`RoundState`], so data that only exists after resolution cannot be
//! read before it.
//!
//! The timeout path ([`CombatRound::resolve_timeout`]) and the player path
//! ([`CombatRound::confirm_hold`]) run the same resolution code.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::{OpponentError, RoundError};
use crate::hand::{compare, evaluate, rank_to_damage, Comparison, HandRank};
use crate::logger::RoundRecord;

/// Cards dealt to the player and to the opponent.
pub const HAND_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Draw,
    Hold,
    Resolved,
}

impl RoundPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundPhase::Draw => "draw",
            RoundPhase::Hold => "hold",
            RoundPhase::Resolved => "resolved",
        }
    }
}

/// Per-round tuning supplied by the owning encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub hold_window_secs: u32,
    pub rerolls: u32,
    pub peeks: u32,
    pub base_damage: u32,
    /// Player-side multiplier from abilities and gear
    pub bonus_multiplier: f64,
    pub opponent_base_damage: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            hold_window_secs: 30,
            rerolls: 1,
            peeks: 1,
            base_damage: 10,
            bonus_multiplier: 1.0,
            opponent_base_damage: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct HpPools {
    pub player: u32,
    pub opponent: u32,
}

/// What an [`OpponentHandSupplier`] is told about the round it plays.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OpponentRequest {
    pub encounter_id: String,
    pub character_id: String,
    pub round_number: u32,
    /// Fixed when the round is dealt, so every instance sees the same draw
    pub seed: u64,
}

/// Supplies the opponent's five cards for a round.
///
/// The opponent plays from its own deck; its cards never come out of the
/// player's round deck.
pub trait OpponentHandSupplier: Send + Sync {
    fn opponent_hand(&self, request: &OpponentRequest) -> Result<Vec<Card>, OpponentError>;

    fn name(&self) -> &str;
}

/// Player state while holding. The only phase that accepts actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingState {
    pub hand: Vec<Card>,
    /// Held indices, sorted and unique
    pub held: Vec<usize>,
    pub deck: Deck,
    pub rerolls_available: u32,
    pub rerolls_used: u32,
    pub peeks_available: u32,
    pub peeks_used: u32,
    pub peeked: Option<Card>,
    pub opponent_seed: u64,
    pub phase_started_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
    #[serde(default)]
    pub warned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedState {
    pub final_hand: Vec<Card>,
    pub held: Vec<usize>,
    pub rank: HandRank,
    pub opponent_hand: Vec<Card>,
    pub opponent_rank: HandRank,
    pub outcome: Comparison,
    pub damage_dealt: u32,
    pub damage_taken: u32,
    pub rerolls_used: u32,
    pub peeks_used: u32,
    pub deck_remaining: usize,
    /// Resolved by the timeout sweep rather than by the player
    pub timed_out: bool,
    pub phase_started_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RoundState {
    Drawing { deck: Deck },
    Holding(HoldingState),
    Resolved(ResolvedState),
}

impl RoundState {
    pub fn phase(&self) -> RoundPhase {
        match self {
            RoundState::Drawing { .. } => RoundPhase::Draw,
            RoundState::Holding(_) => RoundPhase::Hold,
            RoundState::Resolved(_) => RoundPhase::Resolved,
        }
    }
}

/// One exchange of an encounter, owned by that encounter alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRound {
    pub encounter_id: String,
    pub character_id: String,
    pub round_number: u32,
    pub config: RoundConfig,
    pub hp: HpPools,
    pub state: RoundState,
}

impl CombatRound {
    /// A round in the draw phase over `deck`. Call [`CombatRound::deal`] next.
    pub fn drawing(
        encounter_id: impl Into<String>,
        character_id: impl Into<String>,
        round_number: u32,
        config: RoundConfig,
        hp: HpPools,
        deck: Deck,
    ) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            character_id: character_id.into(),
            round_number,
            config,
            hp,
            state: RoundState::Drawing { deck },
        }
    }

    /// Starts round one with a fresh shuffled deck and deals it.
    pub fn start(
        encounter_id: impl Into<String>,
        character_id: impl Into<String>,
        config: RoundConfig,
        hp: HpPools,
        now: DateTime<Utc>,
    ) -> Result<Self, RoundError> {
        let mut round = Self::drawing(encounter_id, character_id, 1, config, hp, Deck::new_shuffled());
        round.deal(now, rand::rng().random())?;
        Ok(round)
    }

    /// Deals the hand and opens the hold window.
    pub fn deal(&mut self, now: DateTime<Utc>, opponent_seed: u64) -> Result<(), RoundError> {
        let mut deck = match &self.state {
            RoundState::Drawing { deck } => deck.clone(),
            RoundState::Holding(_) => return Err(RoundError::AlreadyDealt),
            RoundState::Resolved(_) => return Err(RoundError::AlreadyResolved),
        };
        let hand = deck.draw(HAND_SIZE)?;
        self.state = RoundState::Holding(HoldingState {
            hand,
            held: Vec::new(),
            deck,
            rerolls_available: self.config.rerolls,
            rerolls_used: 0,
            peeks_available: self.config.peeks,
            peeks_used: 0,
            peeked: None,
            opponent_seed,
            phase_started_at: now,
            timeout_at: now + Duration::seconds(i64::from(self.config.hold_window_secs)),
            warned_at: None,
        });
        Ok(())
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase()
    }

    pub fn holding(&self) -> Option<&HoldingState> {
        match &self.state {
            RoundState::Holding(h) => Some(h),
            _ => None,
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedState> {
        match &self.state {
            RoundState::Resolved(r) => Some(r),
            _ => None,
        }
    }

    pub fn timeout_at(&self) -> Option<DateTime<Utc>> {
        self.holding().map(|h| h.timeout_at)
    }

    /// Marks or unmarks one card as held. Returns whether it is now held.
    ///
    /// Outside the hold phase this does nothing and reports `false`.
    pub fn toggle_hold(&mut self, index: usize) -> Result<bool, RoundError> {
        let RoundState::Holding(h) = &mut self.state else {
            return Ok(false);
        };
        if index >= h.hand.len() {
            return Err(RoundError::InvalidIndex {
                index,
                hand_size: h.hand.len(),
            });
        }
        match h.held.binary_search(&index) {
            Ok(pos) => {
                h.held.remove(pos);
                Ok(false)
            }
            Err(pos) => {
                h.held.insert(pos, index);
                Ok(true)
            }
        }
    }

    /// Reveals the next card that would be drawn without consuming it.
    pub fn use_peek(&mut self) -> Result<Card, RoundError> {
        let h = self.holding_mut()?;
        if h.peeks_available == 0 {
            return Err(RoundError::NoPeeksRemaining);
        }
        let card = h.deck.peek(0).ok_or(crate::errors::DeckError::InsufficientCards {
            requested: 1,
            remaining: 0,
        })?;
        h.peeks_available -= 1;
        h.peeks_used += 1;
        h.peeked = Some(card);
        Ok(card)
    }

    /// Redraws every unheld card. Returns the new hand.
    pub fn use_reroll(&mut self) -> Result<Vec<Card>, RoundError> {
        let h = self.holding_mut()?;
        if h.rerolls_available == 0 {
            return Err(RoundError::NoRerollsRemaining);
        }
        let mut next = h.clone();
        replace_unheld(&mut next)?;
        next.rerolls_available -= 1;
        next.rerolls_used += 1;
        // the peeked card may have been drawn
        next.peeked = None;
        let hand = next.hand.clone();
        *h = next;
        Ok(hand)
    }

    /// Replaces unheld cards, scores both hands, applies damage and resolves.
    pub fn confirm_hold(
        &mut self,
        opponent: &dyn OpponentHandSupplier,
        now: DateTime<Utc>,
    ) -> Result<&ResolvedState, RoundError> {
        self.resolve(opponent, now, false)
    }

    /// Resolves an overdue round with whatever the player holds.
    pub fn resolve_timeout(
        &mut self,
        opponent: &dyn OpponentHandSupplier,
        now: DateTime<Utc>,
    ) -> Result<&ResolvedState, RoundError> {
        if !self.is_overdue(now) {
            return match self.phase() {
                RoundPhase::Hold => Err(RoundError::DeadlineNotReached),
                RoundPhase::Resolved => Err(RoundError::AlreadyResolved),
                phase => Err(RoundError::NotHolding(phase)),
            };
        }
        self.resolve(opponent, now, true)
    }

    fn resolve(
        &mut self,
        opponent: &dyn OpponentHandSupplier,
        now: DateTime<Utc>,
        timed_out: bool,
    ) -> Result<&ResolvedState, RoundError> {
        let mut h = self.holding_mut()?.clone();
        replace_unheld(&mut h)?;
        let rank = evaluate(&h.hand)?;

        let request = OpponentRequest {
            encounter_id: self.encounter_id.clone(),
            character_id: self.character_id.clone(),
            round_number: self.round_number,
            seed: h.opponent_seed,
        };
        let opponent_hand = opponent.opponent_hand(&request)?;
        if opponent_hand.len() != HAND_SIZE {
            return Err(RoundError::InvalidOpponentHand(format!(
                "{} supplied {} cards",
                opponent.name(),
                opponent_hand.len()
            )));
        }
        let opponent_rank = evaluate(&opponent_hand)
            .map_err(|e| RoundError::InvalidOpponentHand(format!("{}: {e}", opponent.name())))?;

        let outcome = compare(&rank, &opponent_rank);
        let player_damage = rank_to_damage(&rank, self.config.base_damage, self.config.bonus_multiplier);
        let opponent_damage = rank_to_damage(&opponent_rank, self.config.opponent_base_damage, 1.0);
        // the loser still lands half its damage
        let (damage_dealt, damage_taken) = match outcome {
            Comparison::AWins => (player_damage, opponent_damage / 2),
            Comparison::BWins => (player_damage / 2, opponent_damage),
            Comparison::Tie => (player_damage, opponent_damage),
        };

        self.hp.opponent = self.hp.opponent.saturating_sub(damage_dealt);
        self.hp.player = self.hp.player.saturating_sub(damage_taken);
        self.state = RoundState::Resolved(ResolvedState {
            final_hand: h.hand,
            held: h.held,
            rank,
            opponent_hand,
            opponent_rank,
            outcome,
            damage_dealt,
            damage_taken,
            rerolls_used: h.rerolls_used,
            peeks_used: h.peeks_used,
            deck_remaining: h.deck.remaining(),
            timed_out,
            phase_started_at: h.phase_started_at,
            resolved_at: now,
        });
        match &self.state {
            RoundState::Resolved(r) => Ok(r),
            other => Err(RoundError::NotHolding(other.phase())),
        }
    }

    /// In the hold phase with the deadline reached.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.holding().is_some_and(|h| h.timeout_at <= now)
    }

    /// Whole seconds left when a warning should go out now: the round is
    /// holding, not yet warned, and the deadline is within `lead_secs`.
    pub fn warning_due(&self, now: DateTime<Utc>, lead_secs: u32) -> Option<u64> {
        let h = self.holding()?;
        if h.warned_at.is_some() || h.timeout_at <= now {
            return None;
        }
        let remaining_ms = (h.timeout_at - now).num_milliseconds();
        if remaining_ms > i64::from(lead_secs) * 1000 {
            return None;
        }
        u64::try_from((remaining_ms + 999) / 1000).ok()
    }

    pub fn mark_warned(&mut self, now: DateTime<Utc>) -> Result<(), RoundError> {
        self.holding_mut()?.warned_at = Some(now);
        Ok(())
    }

    /// Either side is out of HP.
    pub fn encounter_finished(&self) -> bool {
        self.hp.player == 0 || self.hp.opponent == 0
    }

    /// The next exchange of the same encounter, HP carried forward.
    pub fn next_round(&self, deck: Deck, now: DateTime<Utc>, opponent_seed: u64) -> Result<CombatRound, RoundError> {
        match self.phase() {
            RoundPhase::Resolved => {}
            phase => return Err(RoundError::InProgress(phase)),
        }
        if self.encounter_finished() {
            return Err(RoundError::EncounterFinished);
        }
        let mut next = CombatRound::drawing(
            self.encounter_id.clone(),
            self.character_id.clone(),
            self.round_number + 1,
            self.config.clone(),
            self.hp,
            deck,
        );
        next.deal(now, opponent_seed)?;
        Ok(next)
    }

    /// [`CombatRound::next_round`] over a fresh shuffled deck and opponent seed.
    pub fn next_round_shuffled(&self, now: DateTime<Utc>) -> Result<CombatRound, RoundError> {
        self.next_round(Deck::new_shuffled(), now, rand::rng().random())
    }

    pub fn archive(&self) -> Result<RoundRecord, RoundError> {
        let r = self
            .resolved()
            .ok_or_else(|| RoundError::InProgress(self.phase()))?;
        Ok(RoundRecord {
            encounter_id: self.encounter_id.clone(),
            character_id: self.character_id.clone(),
            round_number: self.round_number,
            final_hand: r.final_hand.clone(),
            category: r.rank.category,
            opponent_hand: r.opponent_hand.clone(),
            opponent_category: r.opponent_rank.category,
            outcome: r.outcome,
            damage_dealt: r.damage_dealt,
            damage_taken: r.damage_taken,
            resolved_at: r.resolved_at.to_rfc3339(),
        })
    }

    fn holding_mut(&mut self) -> Result<&mut HoldingState, RoundError> {
        match &mut self.state {
            RoundState::Holding(h) => Ok(h),
            RoundState::Resolved(_) => Err(RoundError::AlreadyResolved),
            RoundState::Drawing { .. } => Err(RoundError::NotHolding(RoundPhase::Draw)),
        }
    }
}

/// Replaces unheld cards in index order from the top of the deck.
fn replace_unheld(h: &mut HoldingState) -> Result<(), RoundError> {
    let slots: Vec<usize> = (0..h.hand.len()).filter(|i| !h.held.contains(i)).collect();
    let fresh = h.deck.draw(slots.len())?;
    for (slot, card) in slots.into_iter().zip(fresh) {
        h.hand[slot] = card;
    }
    Ok(())
}
