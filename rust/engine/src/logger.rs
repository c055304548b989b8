use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::hand::{Category, Comparison};
use crate::player::PlayerAction;

/// A betting round of a wagering hand.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    /// Hole cards dealt, no board
    Preflop,
    /// 3 community cards
    Flop,
    /// 4th community card
    Turn,
    /// 5th community card
    River,
    /// Betting closed, hands are compared
    Showdown,
}

impl Street {
    pub fn next(self) -> Street {
        match self {
            Street::Preflop => Street::Flop,
            Street::Flop => Street::Turn,
            Street::Turn => Street::River,
            Street::River | Street::Showdown => Street::Showdown,
        }
    }

    /// Community cards dealt when entering this street.
    pub fn cards_dealt(self) -> usize {
        match self {
            Street::Flop => 3,
            Street::Turn | Street::River => 1,
            Street::Preflop | Street::Showdown => 0,
        }
    }
}

/// A single player action, tagged with the street it happened on.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub player_id: String,
    pub street: Street,
    pub action: PlayerAction,
}

/// One pot of a finished hand and who received it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PotAward {
    pub pot_index: usize,
    pub amount: u32,
    pub winners: Vec<String>,
}

/// Complete record of a wagering hand, serialized as one JSONL line.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HandRecord {
    /// Unique identifier for this hand (format: TABLE-NNNNNN)
    pub hand_id: String,
    pub table_id: String,
    pub actions: Vec<ActionRecord>,
    pub board: Vec<Card>,
    pub awards: Vec<PotAward>,
    /// Timestamp when the hand finished (RFC3339 format)
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub showdown: Option<ShowdownInfo>,
}

/// Hands revealed at showdown. Absent when the pot was won uncontested.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShowdownInfo {
    pub hands: Vec<ShownHand>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShownHand {
    pub player_id: String,
    pub category: Category,
    pub cards: Vec<Card>,
}

/// Archived summary of a resolved hold/discard round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub encounter_id: String,
    pub character_id: String,
    pub round_number: u32,
    pub final_hand: Vec<Card>,
    pub category: Category,
    pub opponent_hand: Vec<Card>,
    pub opponent_category: Category,
    pub outcome: Comparison,
    pub damage_dealt: u32,
    pub damage_taken: u32,
    pub resolved_at: String,
}

pub fn format_hand_id(table_id: &str, seq: u64) -> String {
    format!("{}-{:06}", table_id, seq)
}

use chrono::{SecondsFormat, Utc};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends [`HandRecord`]s to a JSONL file.
pub struct HandLogger {
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl HandLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let f = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(f)),
            written: 0,
        })
    }

    /// Logger that accepts records but writes nowhere.
    pub fn sink() -> Self {
        Self {
            writer: None,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, record: &HandRecord) -> std::io::Result<()> {
        // inject timestamp if missing
        let mut rec = record.clone();
        if rec.ts.is_none() {
            rec.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&rec).map_err(std::io::Error::other)?;
        if let Some(w) = &mut self.writer {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            w.flush()?;
        }
        self.written += 1;
        Ok(())
    }
}
