//! Round and table services.
//!
//! Every action is load, apply to a copy, compare-and-swap write. The engine
//! leaves the copy untouched when it rejects an action, and nothing is
//! written or published unless the write succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gambit_ai::create_opponent;
use gambit_engine::deck::Deck;
use gambit_engine::errors::{OpponentError, RoundError, TableError};
use gambit_engine::logger::RoundRecord;
use gambit_engine::player::PlayerAction;
use gambit_engine::round::{CombatRound, HpPools, RoundConfig, RoundPhase};
use gambit_engine::table::{Blinds, ShowdownResult, WageringTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{EventBus, Notification};
use crate::store::{SqliteStore, StoreError, StoredRound, StoredTable};
use crate::views::{RoundView, TableView};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Opponent(#[from] OpponentError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The blocking task running the store call panicked or was cancelled
    #[error("Service worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartEncounter {
    pub character_id: String,
    pub player_hp: u32,
    pub opponent_hp: u32,
    /// Opponent difficulty; the configured default when absent
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub bonus_multiplier: Option<f64>,
}

/// Player actions on a holding round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoundAction {
    ToggleHold { index: usize },
    UsePeek,
    UseReroll,
    ConfirmHold,
}

/// What is left of a finished encounter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterSummary {
    pub encounter_id: String,
    pub character_id: String,
    pub hp: HpPools,
    pub rounds: Vec<RoundRecord>,
}

#[derive(Debug)]
pub struct CombatService {
    store: Arc<SqliteStore>,
    bus: EventBus,
    round_config: RoundConfig,
    default_opponent: String,
}

impl CombatService {
    pub fn new(
        store: Arc<SqliteStore>,
        bus: EventBus,
        round_config: RoundConfig,
        default_opponent: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            round_config,
            default_opponent: default_opponent.into(),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn start_encounter(
        &self,
        request: StartEncounter,
        now: DateTime<Utc>,
    ) -> Result<StoredRound, ServiceError> {
        if request.character_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("character_id is required".into()));
        }
        if request.player_hp == 0 || request.opponent_hp == 0 {
            return Err(ServiceError::InvalidRequest("hp pools must be >0".into()));
        }
        let mut config = self.round_config.clone();
        if let Some(bonus) = request.bonus_multiplier {
            if !bonus.is_finite() || bonus < 0.0 {
                return Err(ServiceError::InvalidRequest(
                    "bonus_multiplier must be a finite number >=0".into(),
                ));
            }
            config.bonus_multiplier = bonus;
        }
        let opponent = request
            .opponent
            .unwrap_or_else(|| self.default_opponent.clone());
        // reject unknown names before anything is stored
        let supplier = create_opponent(&opponent)?;

        let encounter_id = uuid::Uuid::new_v4().to_string();
        let hp = HpPools {
            player: request.player_hp,
            opponent: request.opponent_hp,
        };
        let round = CombatRound::start(&encounter_id, request.character_id, config, hp, now)?;
        let stored = self.store.insert_round(&round, supplier.name())?;

        tracing::info!(
            encounter_id = %encounter_id,
            character_id = %stored.round.character_id,
            opponent = %stored.opponent,
            "encounter started"
        );
        self.publish_round(&stored.round);
        Ok(stored)
    }

    /// Starts round `n + 1` once round `n` is resolved.
    pub fn start_next_round(
        &self,
        encounter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRound, ServiceError> {
        let stored = self.store.load_round(encounter_id)?;
        let record = stored.round.archive()?;
        let next = stored.round.next_round_shuffled(now)?;
        self.store.archive_round(&record)?;
        let version = self.store.save_round(&next, stored.version)?;

        tracing::info!(
            encounter_id = %encounter_id,
            round_number = next.round_number,
            "next round dealt"
        );
        self.publish_round(&next);
        Ok(StoredRound {
            round: next,
            opponent: stored.opponent,
            version,
        })
    }

    pub fn get_round(&self, encounter_id: &str) -> Result<StoredRound, ServiceError> {
        Ok(self.store.load_round(encounter_id)?)
    }

    pub fn apply(
        &self,
        encounter_id: &str,
        action: RoundAction,
        now: DateTime<Utc>,
    ) -> Result<StoredRound, ServiceError> {
        let stored = self.store.load_round(encounter_id)?;
        let mut round = stored.round.clone();
        match action {
            RoundAction::ToggleHold { index } => {
                round.toggle_hold(index)?;
            }
            RoundAction::UsePeek => {
                round.use_peek()?;
            }
            RoundAction::UseReroll => {
                round.use_reroll()?;
            }
            RoundAction::ConfirmHold => {
                let opponent = create_opponent(&stored.opponent)?;
                round.confirm_hold(opponent.as_ref(), now)?;
            }
        }
        if round == stored.round {
            return Ok(stored);
        }
        let version = self.store.save_round(&round, stored.version)?;

        tracing::debug!(
            encounter_id = %encounter_id,
            action = ?action,
            phase = round.phase().as_str(),
            version,
            "round action applied"
        );
        if round.phase() == RoundPhase::Resolved {
            self.archive_quietly(&round);
        }
        self.publish_round(&round);
        Ok(StoredRound {
            round,
            opponent: stored.opponent,
            version,
        })
    }

    /// Forces an overdue round to resolution with the cards currently held.
    ///
    /// The same transition as a player's confirm, flagged as timed out.
    pub fn resolve_overdue(
        &self,
        encounter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRound, ServiceError> {
        let stored = self.store.load_round(encounter_id)?;
        let mut round = stored.round.clone();
        let opponent = create_opponent(&stored.opponent)?;
        let message = {
            let resolved = round.resolve_timeout(opponent.as_ref(), now)?;
            format!(
                "Time ran out. Your {} met their {}: {} damage dealt, {} taken.",
                resolved.rank.category.name(),
                resolved.opponent_rank.category.name(),
                resolved.damage_dealt,
                resolved.damage_taken
            )
        };
        let version = self.store.save_round(&round, stored.version)?;
        self.archive_quietly(&round);

        tracing::info!(
            encounter_id = %encounter_id,
            character_id = %round.character_id,
            round_number = round.round_number,
            "overdue round resolved"
        );
        self.bus.publish(
            &round.encounter_id,
            Notification::RoundTimeoutResolved {
                encounter_id: round.encounter_id.clone(),
                character_id: round.character_id.clone(),
                message,
                new_state: RoundView::from(&round),
            },
        );
        Ok(StoredRound {
            round,
            opponent: stored.opponent,
            version,
        })
    }

    /// Sends the one warning a round gets when its deadline is within `lead_secs`.
    ///
    /// Returns the seconds left when a warning went out.
    pub fn warn_if_due(
        &self,
        encounter_id: &str,
        now: DateTime<Utc>,
        lead_secs: u32,
    ) -> Result<Option<u64>, ServiceError> {
        let stored = self.store.load_round(encounter_id)?;
        let Some(seconds_remaining) = stored.round.warning_due(now, lead_secs) else {
            return Ok(None);
        };
        let mut round = stored.round.clone();
        round.mark_warned(now)?;
        self.store.save_round(&round, stored.version)?;

        self.bus.publish(
            &round.encounter_id,
            Notification::TimeoutWarning {
                encounter_id: round.encounter_id.clone(),
                character_id: round.character_id.clone(),
                seconds_remaining,
            },
        );
        Ok(Some(seconds_remaining))
    }

    /// Archives the last round, removes the live document and returns the history.
    pub fn finish_encounter(&self, encounter_id: &str) -> Result<EncounterSummary, ServiceError> {
        let stored = self.store.load_round(encounter_id)?;
        let record = stored.round.archive()?;
        self.store.archive_round(&record)?;
        self.store.delete_round(encounter_id)?;
        let rounds = self.store.archived_rounds(encounter_id)?;
        self.bus.drop_channel(encounter_id);

        tracing::info!(
            encounter_id = %encounter_id,
            rounds = rounds.len(),
            "encounter finished"
        );
        Ok(EncounterSummary {
            encounter_id: stored.round.encounter_id,
            character_id: stored.round.character_id,
            hp: stored.round.hp,
            rounds,
        })
    }

    pub fn archived_rounds(&self, encounter_id: &str) -> Result<Vec<RoundRecord>, ServiceError> {
        Ok(self.store.archived_rounds(encounter_id)?)
    }

    // The round is already saved; `finish_encounter` archives it again.
    fn archive_quietly(&self, round: &CombatRound) {
        let result = round
            .archive()
            .map_err(ServiceError::from)
            .and_then(|record| self.store.archive_round(&record).map_err(ServiceError::from));
        if let Err(e) = result {
            tracing::warn!(
                encounter_id = %round.encounter_id,
                error = %e,
                "failed to archive resolved round"
            );
        }
    }

    fn publish_round(&self, round: &CombatRound) {
        self.bus.publish(
            &round.encounter_id,
            Notification::RoundState {
                encounter_id: round.encounter_id.clone(),
                round: RoundView::from(round),
            },
        );
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeatRequest {
    pub player_id: String,
    pub stack: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StartHandRequest {
    pub small_blind: u32,
    pub big_blind: u32,
    #[serde(default)]
    pub ante: u32,
}

impl From<StartHandRequest> for Blinds {
    fn from(r: StartHandRequest) -> Self {
        Blinds::new(r.small_blind, r.big_blind).with_ante(r.ante)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableActionRequest {
    pub player_id: String,
    pub action: PlayerAction,
}

#[derive(Debug, Clone)]
pub struct TableActResult {
    pub stored: StoredTable,
    /// Present when the action ended the hand
    pub showdown: Option<ShowdownResult>,
}

#[derive(Debug)]
pub struct TableService {
    store: Arc<SqliteStore>,
    bus: EventBus,
}

impl TableService {
    pub fn new(store: Arc<SqliteStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn create_table(&self, table_id: Option<String>) -> Result<StoredTable, ServiceError> {
        let table_id = match table_id {
            Some(id) if id.trim().is_empty() => {
                return Err(ServiceError::InvalidRequest("table_id must not be empty".into()));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        let stored = self.store.insert_table(&WageringTable::new(&table_id))?;
        tracing::info!(table_id = %table_id, "table created");
        Ok(stored)
    }

    pub fn get_table(&self, table_id: &str) -> Result<StoredTable, ServiceError> {
        Ok(self.store.load_table(table_id)?)
    }

    pub fn seat_player(&self, table_id: &str, request: SeatRequest) -> Result<StoredTable, ServiceError> {
        self.update(table_id, |table| {
            let seat = table.seat_player(request.player_id.clone(), request.stack)?;
            tracing::info!(
                table_id = %table_id,
                player_id = %request.player_id,
                seat,
                "player seated"
            );
            Ok(())
        })
    }

    pub fn start_hand(&self, table_id: &str, blinds: Blinds) -> Result<StoredTable, ServiceError> {
        self.start_hand_with_deck(table_id, blinds, Deck::new_shuffled())
    }

    /// [`TableService::start_hand`] over a given deck, for replays and tests.
    pub fn start_hand_with_deck(
        &self,
        table_id: &str,
        blinds: Blinds,
        deck: Deck,
    ) -> Result<StoredTable, ServiceError> {
        self.update(table_id, |table| {
            table.start_hand_with_deck(blinds, deck)?;
            tracing::info!(
                table_id = %table_id,
                hand_number = table.hand_number(),
                "hand started"
            );
            Ok(())
        })
    }

    /// Applies one wagering action; settles the pot once the hand reaches showdown.
    pub fn act(
        &self,
        table_id: &str,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<TableActResult, ServiceError> {
        let stored = self.store.load_table(table_id)?;
        let mut table = stored.table.clone();
        let outcome = table.act(player_id, action.clone())?;
        let board = table.board().to_vec();
        let showdown = if outcome.showdown_reached() {
            Some(table.resolve_showdown()?)
        } else {
            None
        };
        let version = self.store.save_table(&table, stored.version)?;

        tracing::debug!(
            table_id = %table_id,
            player_id = %player_id,
            action = ?action,
            street = ?outcome.street_after,
            "table action applied"
        );
        self.publish_table(&table);
        if outcome.street_advanced() {
            self.bus.publish(
                table_id,
                Notification::StreetAdvanced {
                    table_id: table_id.to_string(),
                    street: outcome.street_after,
                    board,
                },
            );
        }
        if let Some(result) = &showdown {
            tracing::info!(
                table_id = %table_id,
                hand_id = %result.record.hand_id,
                uncontested = result.uncontested,
                "hand complete"
            );
            self.bus.publish(
                table_id,
                Notification::HandComplete {
                    table_id: table_id.to_string(),
                    hand_id: result.record.hand_id.clone(),
                    payouts: result.payouts.clone(),
                },
            );
        }
        Ok(TableActResult {
            stored: StoredTable { table, version },
            showdown,
        })
    }

    fn update(
        &self,
        table_id: &str,
        change: impl FnOnce(&mut WageringTable) -> Result<(), ServiceError>,
    ) -> Result<StoredTable, ServiceError> {
        let stored = self.store.load_table(table_id)?;
        let mut table = stored.table.clone();
        change(&mut table)?;
        let version = self.store.save_table(&table, stored.version)?;
        self.publish_table(&table);
        Ok(StoredTable { table, version })
    }

    fn publish_table(&self, table: &WageringTable) {
        self.bus.publish(
            table.table_id(),
            Notification::TableState {
                table_id: table.table_id().to_string(),
                table: TableView::for_viewer(table, None),
            },
        );
    }
}
