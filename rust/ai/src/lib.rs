//! # gambit-ai: Automated Players
//!
//! Implementations for the engine's two automation seams.
//!
//! ## Core Components
//!
//! - [`opponent`] - [`opponent::BaselineOpponent`], a fixed-difficulty
//!   combat opponent implementing [`OpponentHandSupplier`]
//! - [`baseline`] - [`baseline::BaselinePolicy`], a rule-based wagering player
//! - [`TablePolicy`] - Trait for choosing a betting action at a table
//! - [`create_opponent`] / [`create_policy`] - Factories by name
//!
//! ## Quick Start
//!
//! ```rust
//! use gambit_ai::create_opponent;
//! use gambit_engine::round::OpponentRequest;
//!
//! let opponent = create_opponent("hard").unwrap();
//! let request = OpponentRequest {
//!     encounter_id: "enc".into(),
//!     character_id: "hero".into(),
//!     round_number: 1,
//!     seed: 42,
//! };
//! let cards = opponent.opponent_hand(&request).unwrap();
//! assert_eq!(cards.len(), 5);
//! ```

use gambit_engine::errors::OpponentError;
use gambit_engine::player::PlayerAction;
use gambit_engine::round::OpponentHandSupplier;
use gambit_engine::table::WageringTable;

pub mod baseline;
pub mod opponent;

pub use opponent::{BaselineOpponent, Difficulty};

/// Chooses betting actions for an automated seat.
///
/// # Example Implementation
///
/// ```rust
/// use gambit_ai::TablePolicy;
/// use gambit_engine::player::PlayerAction;
/// use gambit_engine::table::WageringTable;
///
/// struct CallingStation;
///
/// impl TablePolicy for CallingStation {
///     fn decide(&self, table: &WageringTable, player_id: &str) -> PlayerAction {
///         if table.to_call(player_id) == 0 {
///             PlayerAction::Check
///         } else {
///             PlayerAction::Call
///         }
///     }
///
///     fn name(&self) -> &str {
///         "CallingStation"
///     }
/// }
/// ```
pub trait TablePolicy: Send + Sync {
    /// The action for `player_id`, who must be the seat to act.
    fn decide(&self, table: &WageringTable, player_id: &str) -> PlayerAction;

    fn name(&self) -> &str;
}

/// Builds a combat opponent by difficulty name (`easy`, `normal`, `hard`).
///
/// ```rust
/// use gambit_ai::create_opponent;
///
/// assert_eq!(create_opponent("normal").unwrap().name(), "normal");
/// assert!(create_opponent("impossible").is_err());
/// ```
pub fn create_opponent(name: &str) -> Result<Box<dyn OpponentHandSupplier>, OpponentError> {
    let difficulty: Difficulty = name.parse()?;
    Ok(Box::new(BaselineOpponent::new(difficulty)))
}

/// Builds a wagering policy by name. Only `baseline` exists.
pub fn create_policy(name: &str) -> Result<Box<dyn TablePolicy>, OpponentError> {
    match name {
        "baseline" => Ok(Box::new(baseline::BaselinePolicy::new())),
        other => Err(OpponentError(format!("unknown policy `{other}`"))),
    }
}
