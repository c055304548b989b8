//! Deal command: hole cards for each player and a five-card board.
//!
//! Cards come off one deck in order, two per player then the board, so the
//! same seed always prints the same deal.

use crate::error::CliError;
use crate::formatters::format_cards;
use gambit_engine::deck::Deck;
use std::io::Write;

pub fn handle_deal_command(
    seed: Option<u64>,
    players: u8,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let base_seed = seed.unwrap_or_else(rand::random);
    let mut deck = Deck::new_with_seed(base_seed);

    writeln!(out, "Seed: {}", base_seed)?;
    for p in 1..=players {
        let hole = deck.draw(2)?;
        writeln!(out, "Hole P{}: {}", p, format_cards(&hole))?;
    }
    let board = deck.draw(5)?;
    writeln!(out, "Board: {}", format_cards(&board))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(seed: u64, players: u8) -> String {
        let mut out = Vec::new();
        handle_deal_command(Some(seed), players, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_deal_command_is_deterministic() {
        assert_eq!(deal(42, 2), deal(42, 2));
        assert_ne!(deal(42, 2), deal(43, 2));
    }

    #[test]
    fn test_deal_command_prints_every_player() {
        let output = deal(7, 6);
        assert!(output.starts_with("Seed: 7\n"));
        for p in 1..=6 {
            assert!(output.contains(&format!("Hole P{}: ", p)));
        }
        let board = output
            .lines()
            .find_map(|l| l.strip_prefix("Board: "))
            .unwrap();
        assert_eq!(board.split_whitespace().count(), 5);
    }

    #[test]
    fn test_deal_command_never_repeats_a_card() {
        let output = deal(99, 10);
        let mut cards: Vec<&str> = output
            .lines()
            .skip(1)
            .flat_map(|l| l.split_once(": ").map(|(_, c)| c).unwrap_or("").split_whitespace())
            .collect();
        assert_eq!(cards.len(), 25);
        cards.sort_unstable();
        cards.dedup();
        assert_eq!(cards.len(), 25);
    }
}
