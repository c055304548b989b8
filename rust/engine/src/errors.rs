use thiserror::Error;

use crate::logger::Street;
use crate::round::RoundPhase;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardParseError {
    #[error("Malformed card: `{0}`")]
    Malformed(String),
    #[error("Unknown suit: `{0}`")]
    UnknownSuit(char),
    #[error("Unknown rank: `{0}`")]
    UnknownRank(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeckError {
    #[error("Insufficient cards: requested {requested}, remaining {remaining}")]
    InsufficientCards { requested: usize, remaining: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Hand evaluation needs 5 to 7 cards, got {0}")]
    WrongCardCount(usize),
    #[error("Duplicate card in hand: {0}")]
    DuplicateCard(crate::cards::Card),
}

/// Failure reported by an [`crate::round::OpponentHandSupplier`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Opponent hand unavailable: {0}")]
pub struct OpponentError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("Card index {index} is out of range for a hand of {hand_size}")]
    InvalidIndex { index: usize, hand_size: usize },
    #[error("No peeks remaining")]
    NoPeeksRemaining,
    #[error("No rerolls remaining")]
    NoRerollsRemaining,
    #[error("Round already resolved")]
    AlreadyResolved,
    #[error("Round already dealt")]
    AlreadyDealt,
    #[error("Round is still in the {0:?} phase")]
    InProgress(RoundPhase),
    #[error("Round is in {0:?} phase; actions need the hold phase")]
    NotHolding(RoundPhase),
    #[error("Hold deadline has not passed yet")]
    DeadlineNotReached,
    #[error("Round cannot continue: encounter already finished")]
    EncounterFinished,
    #[error("Invalid opponent hand: {0}")]
    InvalidOpponentHand(String),
    #[error(transparent)]
    Opponent(#[from] OpponentError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Invalid bet amount: {amount}, minimum: {minimum}")]
    InvalidBetAmount { amount: u32, minimum: u32 },
    #[error("Insufficient chips for action: needs {needed}, has {available}")]
    InsufficientChips { needed: u32, available: u32 },
    #[error("Cannot check: {to_call} chips to call")]
    BetPending { to_call: u32 },
    #[error("Nothing to call")]
    NothingToCall,
    #[error("No bet to raise; open with a bet")]
    NothingToRaise,
    #[error("No hand in progress")]
    NoHandInProgress,
    #[error("A hand is already in progress")]
    HandInProgress,
    #[error("Betting is closed; showdown pending")]
    ShowdownPending,
    #[error("Table is in {0:?}; showdown is not ready")]
    ShowdownNotReady(Street),
    #[error("Player already folded")]
    PlayerAlreadyFolded,
    #[error("Player is all-in")]
    PlayerAllIn,
    #[error("It's not {actual}'s turn (expected {expected})")]
    NotPlayersTurn { expected: String, actual: String },
    #[error("Player {0} is not seated at this table")]
    PlayerNotSeated(String),
    #[error("Player {0} is already seated")]
    AlreadySeated(String),
    #[error("Table is full ({0} seats)")]
    TableFull(usize),
    #[error("Need at least two players with chips, found {0}")]
    NotEnoughPlayers(usize),
    #[error("Table chips would total {total}, above the limit of {limit}")]
    ChipLimit { total: u64, limit: u32 },
    #[error("Invalid blinds: small {small}, big {big}")]
    InvalidBlinds { small: u32, big: u32 },
    #[error("Chip conservation violated: expected {expected}, found {found}")]
    ChipConservation { expected: u64, found: u64 },
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
