//! Simulation command: baseline policies play hands at one wagering table.
//!
//! Stacks carry over from hand to hand and the button moves as it would at a
//! real table. Hand `i` is dealt from `Deck::new_with_seed(seed + i)` when a
//! seed is given. Every completed hand is appended to the JSONL output and
//! chip conservation is checked after each one.

use crate::error::CliError;
use crate::formatters::format_action;
use crate::ui;
use gambit_ai::{create_policy, TablePolicy};
use gambit_engine::deck::Deck;
use gambit_engine::logger::{HandLogger, Street};
use gambit_engine::player::PlayerAction;
use gambit_engine::table::{Blinds, WageringTable};
use std::io::Write;
use std::path::PathBuf;

// Far above any legal betting sequence at ten seats
const MAX_ACTIONS_PER_HAND: usize = 1_000;

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub hands: u64,
    pub players: u8,
    pub stack: u32,
    pub seed: Option<u64>,
    pub output: Option<PathBuf>,
    pub small_blind: u32,
    pub big_blind: u32,
}

pub fn handle_sim_command(
    opts: SimOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), CliError> {
    if opts.hands == 0 {
        return Err(CliError::InvalidInput("hands must be >= 1".to_string()));
    }
    if opts.stack == 0 {
        return Err(CliError::InvalidInput("stack must be >= 1".to_string()));
    }
    if opts.small_blind == 0 || opts.big_blind < opts.small_blind {
        return Err(CliError::InvalidInput(format!(
            "blinds {}/{} must satisfy 0 < small <= big",
            opts.small_blind, opts.big_blind
        )));
    }

    let policy = create_policy("baseline").map_err(|e| CliError::Engine(e.to_string()))?;
    let mut logger = match &opts.output {
        Some(path) => HandLogger::create(path)?,
        None => HandLogger::sink(),
    };

    let mut table = WageringTable::new("sim");
    for p in 1..=opts.players {
        table.seat_player(format!("p{}", p), opts.stack)?;
    }
    let expected_chips = u64::from(opts.players) * u64::from(opts.stack);
    let blinds = Blinds::new(opts.small_blind, opts.big_blind);

    let mut played = 0u64;
    for i in 0..opts.hands {
        let funded = table.players().iter().filter(|p| p.stack > 0).count();
        if funded < 2 {
            ui::display_warning(
                err,
                &format!("Stopping after {} hands: fewer than 2 players have chips", played),
            )?;
            break;
        }

        let deck = match opts.seed {
            Some(seed) => Deck::new_with_seed(seed.wrapping_add(i)),
            None => Deck::new_shuffled(),
        };
        table.start_hand_with_deck(blinds, deck)?;
        play_betting(&mut table, policy.as_ref(), err)?;
        let result = table.resolve_showdown()?;

        let found = table.chip_total();
        if found != expected_chips {
            return Err(CliError::Engine(format!(
                "chip conservation violated after hand {}: expected {}, found {}",
                result.hand_number, expected_chips, found
            )));
        }
        logger.write(&result.record)?;
        played += 1;
    }

    writeln!(out, "Simulated: {} hands", played)?;
    if let Some(path) = &opts.output {
        writeln!(out, "Wrote {} records to {}", logger.written(), path.display())?;
    }
    Ok(())
}

/// Drives the current hand to showdown. A policy action the table rejects
/// is replaced by check, or fold when there is something to call.
fn play_betting(
    table: &mut WageringTable,
    policy: &dyn TablePolicy,
    err: &mut dyn Write,
) -> Result<(), CliError> {
    for _ in 0..MAX_ACTIONS_PER_HAND {
        if table.street() == Some(Street::Showdown) {
            return Ok(());
        }
        let Some(player) = table.to_act() else {
            return Err(CliError::Engine(
                "betting stalled with no player to act".to_string(),
            ));
        };
        let id = player.id.clone();
        let action = policy.decide(table, &id);
        if let Err(e) = table.act(&id, action.clone()) {
            let fallback = if table.to_call(&id) == 0 {
                PlayerAction::Check
            } else {
                PlayerAction::Fold
            };
            ui::display_warning(
                err,
                &format!(
                    "{} {} rejected ({}), playing {}",
                    id,
                    format_action(&action),
                    e,
                    format_action(&fallback)
                ),
            )?;
            table.act(&id, fallback)?;
        }
    }
    Err(CliError::Engine(format!(
        "hand did not finish within {} actions",
        MAX_ACTIONS_PER_HAND
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(hands: u64, players: u8, seed: u64) -> SimOptions {
        SimOptions {
            hands,
            players,
            stack: 1000,
            seed: Some(seed),
            output: None,
            small_blind: 5,
            big_blind: 10,
        }
    }

    #[test]
    fn test_sim_runs_requested_hands() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        handle_sim_command(options(20, 4, 11), &mut out, &mut err).unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Simulated: "), "{output}");
    }

    #[test]
    fn test_sim_rejects_zero_hands() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let res = handle_sim_command(options(0, 2, 1), &mut out, &mut err);
        assert!(matches!(res, Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_sim_rejects_inverted_blinds() {
        let mut opts = options(1, 2, 1);
        opts.small_blind = 20;
        let res = handle_sim_command(opts, &mut Vec::new(), &mut Vec::new());
        assert!(matches!(res, Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_sim_is_deterministic_with_seed() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        for path in [&a, &b] {
            let mut opts = options(5, 3, 2024);
            opts.output = Some(path.clone());
            handle_sim_command(opts, &mut Vec::new(), &mut Vec::new()).unwrap();
        }
        let strip_ts = |text: String| -> Vec<serde_json::Value> {
            text.lines()
                .map(|l| {
                    let mut v: serde_json::Value = serde_json::from_str(l).unwrap();
                    v.as_object_mut().unwrap().remove("ts");
                    v
                })
                .collect()
        };
        let left = strip_ts(std::fs::read_to_string(&a).unwrap());
        let right = strip_ts(std::fs::read_to_string(&b).unwrap());
        assert!(!left.is_empty());
        assert_eq!(left, right);
    }
}
