//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gambit",
    version,
    about = "Gambit card adjudication CLI: deal, evaluate, simulate and sweep"
)]
pub struct GambitCli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deal hole cards and a full board from one deck
    Deal {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(2..=10))]
        players: u8,
    },
    /// Rank the best five-card hand among 5 to 7 cards
    Eval {
        /// Cards such as `Ah Kd`, in one or several arguments
        #[arg(required = true, num_args = 1..)]
        cards: Vec<String>,
    },
    /// Play hands between baseline policies and record them as JSONL
    Sim {
        #[arg(long)]
        hands: u64,
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(2..=10))]
        players: u8,
        #[arg(long, default_value_t = 1000)]
        stack: u32,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 5)]
        small_blind: u32,
        #[arg(long, default_value_t = 10)]
        big_blind: u32,
    },
    /// Run one timeout sweep and one warning sweep against the shared store
    Sweep {
        /// Store path, overriding `GAMBIT_DB` and the config file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show the resolved configuration and where each value came from
    Cfg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_defaults() {
        let cli = GambitCli::try_parse_from(["gambit", "sim", "--hands", "3"]).unwrap();
        match cli.cmd {
            Commands::Sim {
                hands,
                players,
                stack,
                seed,
                output,
                small_blind,
                big_blind,
            } => {
                assert_eq!(hands, 3);
                assert_eq!(players, 2);
                assert_eq!(stack, 1000);
                assert_eq!(seed, None);
                assert!(output.is_none());
                assert_eq!((small_blind, big_blind), (5, 10));
            }
            _ => panic!("Expected Commands::Sim variant"),
        }
    }

    #[test]
    fn test_players_out_of_range_rejected() {
        assert!(GambitCli::try_parse_from(["gambit", "deal", "--players", "11"]).is_err());
        assert!(GambitCli::try_parse_from(["gambit", "deal", "--players", "1"]).is_err());
    }

    #[test]
    fn test_eval_requires_cards() {
        assert!(GambitCli::try_parse_from(["gambit", "eval"]).is_err());
        let cli = GambitCli::try_parse_from(["gambit", "eval", "Ah", "Kh", "Qh", "Jh", "Th"]).unwrap();
        match cli.cmd {
            Commands::Eval { cards } => assert_eq!(cards.len(), 5),
            _ => panic!("Expected Commands::Eval variant"),
        }
    }
}
