//! Eval command: rank the best five-card hand among 5 to 7 cards.

use crate::error::CliError;
use crate::formatters::format_cards;
use gambit_engine::cards::parse_cards;
use gambit_engine::hand::evaluate;
use std::io::Write;

pub fn handle_eval_command(cards: &[String], out: &mut dyn Write) -> Result<(), CliError> {
    let parsed = parse_cards(&cards.join(" "))?;
    let rank = evaluate(&parsed)?;

    writeln!(out, "Category: {}", rank.category.name())?;
    writeln!(out, "Best: {}", format_cards(&rank.cards))?;
    Ok(())
}
