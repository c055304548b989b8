//! # Gambit CLI Library
//!
//! Command-line front end for the gambit engine: deal and evaluate cards,
//! simulate wagering hands between baseline policies, run the timeout
//! enforcer once against the shared store, and inspect configuration.
//!
//! The primary entry point is [`run`], which parses arguments and dispatches
//! to a subcommand handler.
//!
//! ```
//! let mut out = Vec::new();
//! let mut err = Vec::new();
//! let code = gambit_cli::run(["gambit", "deal", "--seed", "42"], &mut out, &mut err);
//! assert_eq!(code, 0);
//! assert!(String::from_utf8(out).unwrap().contains("Board:"));
//! ```
//!
//! ## Subcommands
//!
//! - `deal`: Deal hole cards and a board from one seeded deck
//! - `eval`: Rank a 5 to 7 card hand
//! - `sim`: Simulate wagering hands and write JSONL hand history
//! - `sweep`: One timeout sweep plus one warning sweep
//! - `cfg`: Resolved configuration with value sources

use clap::Parser;
use std::io::Write;

pub mod cli;
mod commands;
mod error;
pub mod exit_code;
pub mod formatters;
pub mod ui;

use cli::{Commands, GambitCli};
use commands::{
    handle_cfg_command, handle_deal_command, handle_eval_command, handle_sim_command,
    handle_sweep_command, SimOptions,
};

pub use error::CliError;

const COMMANDS: &[&str] = &["deal", "eval", "sim", "sweep", "cfg"];

/// Parses `args` and runs the selected subcommand.
///
/// Returns the process exit code: `0` on success, `2` on any error. Help and
/// version output go to `out` with code `0`.
pub fn run<I, S>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let argv: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

    let cli = match GambitCli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => return report_parse_error(e, out, err),
    };

    let result = match cli.cmd {
        Commands::Deal { seed, players } => handle_deal_command(seed, players, out),
        Commands::Eval { cards } => handle_eval_command(&cards, out),
        Commands::Sim {
            hands,
            players,
            stack,
            seed,
            output,
            small_blind,
            big_blind,
        } => handle_sim_command(
            SimOptions {
                hands,
                players,
                stack,
                seed,
                output,
                small_blind,
                big_blind,
            },
            out,
            err,
        ),
        Commands::Sweep { db } => handle_sweep_command(db, out),
        Commands::Cfg => handle_cfg_command(out),
    };

    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            let _ = ui::write_error(err, &e.to_string());
            exit_code::ERROR
        }
    }
}

fn report_parse_error(e: clap::Error, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    use clap::error::ErrorKind;

    // Help and version print to stdout and exit 0
    if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        return match write!(out, "{}", e) {
            Ok(()) => exit_code::SUCCESS,
            Err(_) => exit_code::ERROR,
        };
    }

    let mut usage = format!("{}\n\nUsage: gambit <command> [options]\n\nCommands:\n", e);
    for c in COMMANDS {
        usage.push_str(&format!("  {}\n", c));
    }
    usage.push_str("\nFor full help, run: gambit --help\n");
    let _ = write!(err, "{}", usage);
    exit_code::ERROR
}
