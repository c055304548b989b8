//! Card and action formatters for terminal display.
//!
//! Cards print in their two-character text form (`Ah`, `Td`), the same form
//! `eval` accepts as input.
//!
//! ## Example
//!
//! ```rust
//! use gambit_cli::formatters::format_cards;
//! use gambit_engine::cards::parse_cards;
//!
//! let board = parse_cards("Ah Kd 7c").unwrap();
//! assert_eq!(format_cards(&board), "Ah Kd 7c");
//! ```

use gambit_engine::cards::Card;
use gambit_engine::player::PlayerAction;

/// Space-separated cards.
pub fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_action(action: &PlayerAction) -> String {
    match action {
        PlayerAction::Fold => "fold".to_string(),
        PlayerAction::Check => "check".to_string(),
        PlayerAction::Call => "call".to_string(),
        PlayerAction::Bet(amount) => format!("bet {}", amount),
        PlayerAction::Raise(amount) => format!("raise to {}", amount),
        PlayerAction::AllIn => "all-in".to_string(),
    }
}
