//! # gambit-engine: Card Adjudication Core
//!
//! Turns a deck of cards into a resolved combat round or a resolved
//! multi-player wagering hand. Everything here is pure data and validated
//! transitions: no clocks are read except where a caller passes `now`, and
//! no I/O happens except in the optional JSONL [`logger::HandLogger`].
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card), text form and the canonical 52
//! - [`deck`] - No-replacement deck with ChaCha20 shuffles, OS-seeded or fixed-seed
//! - [`hand`] - Hand evaluation for 5 to 7 cards, comparison and damage scaling
//! - [`player`] - Betting actions and per-seat table state
//! - [`rules`] - Betting validation independent of table state
//! - [`pot`] - Main pot and side pot layering, odd-chip splitting
//! - [`table`] - The wagering table state machine
//! - [`round`] - The hold/discard combat round state machine
//! - [`logger`] - Streets, hand/round records and JSONL hand history
//! - [`errors`] - Error types for every operation
//!
//! ## Quick Start
//!
//! ```rust
//! use gambit_engine::cards::parse_cards;
//! use gambit_engine::hand::{evaluate, Category};
//!
//! let cards = parse_cards("Ah Kh Qh Jh Th 2c 3d").unwrap();
//! let rank = evaluate(&cards).unwrap();
//! assert_eq!(rank.category, Category::RoyalFlush);
//! ```
//!
//! ## Deterministic Replays
//!
//! ```rust
//! use gambit_engine::deck::Deck;
//!
//! // Same seed produces same order
//! assert_eq!(Deck::new_with_seed(42), Deck::new_with_seed(42));
//! ```
//!
//! ## Wagering
//!
//! ```rust
//! use gambit_engine::deck::Deck;
//! use gambit_engine::player::PlayerAction;
//! use gambit_engine::table::{Blinds, WageringTable};
//!
//! let mut table = WageringTable::new("t1");
//! table.seat_player("alice", 100).unwrap();
//! table.seat_player("bob", 100).unwrap();
//! table
//!     .start_hand_with_deck(Blinds::new(1, 2), Deck::new_with_seed(7))
//!     .unwrap();
//! table.act("alice", PlayerAction::Fold).unwrap();
//! let result = table.resolve_showdown().unwrap();
//! assert!(result.uncontested);
//! assert_eq!(table.chip_total(), 200);
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod hand;
pub mod logger;
pub mod player;
pub mod pot;
pub mod round;
pub mod rules;
pub mod table;
