use crate::errors::TableError;
use crate::player::PlayerAction as A;

/// A legal action with the number of chips it moves from the stack into the pot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    Fold,
    Check,
    Call(u32),
    Bet(u32),
    Raise(u32),
    AllIn(u32),
}

impl ValidatedAction {
    /// Chips committed by this action.
    pub fn commit(&self) -> u32 {
        match self {
            ValidatedAction::Fold | ValidatedAction::Check => 0,
            ValidatedAction::Call(c)
            | ValidatedAction::Bet(c)
            | ValidatedAction::Raise(c)
            | ValidatedAction::AllIn(c) => *c,
        }
    }
}

/// Validates a player action against the player's stack and the live bet.
///
/// `Bet` and `Raise` carry the target street total, not the increment. A
/// bet or raise must reach at least `table_bet + min_raise`; committing the
/// whole stack is always legal and becomes [`ValidatedAction::AllIn`], even
/// when it falls short of a full raise.
///
/// # Arguments
///
/// * `stack` - Player's remaining chip stack
/// * `street_bet` - Chips the player already put in on this street
/// * `table_bet` - Highest street total any player has reached
/// * `min_raise` - Minimum raise increment (the last full raise, or the big blind)
/// * `action` - The action the player wishes to perform
///
/// # Errors
///
/// - [`TableError::BetPending`] - check while facing a bet
/// - [`TableError::NothingToCall`] - call with nothing owed
/// - [`TableError::NothingToRaise`] - raise with no live bet
/// - [`TableError::InvalidBetAmount`] - target below the minimum
/// - [`TableError::InsufficientChips`] - target needs more chips than the stack holds
///
/// # Examples
///
/// ```
/// use gambit_engine::rules::{validate_action, ValidatedAction};
/// use gambit_engine::player::PlayerAction;
///
/// // Facing a 50 bet with nothing in yet
/// assert_eq!(
///     validate_action(1000, 0, 50, 50, PlayerAction::Call),
///     Ok(ValidatedAction::Call(50))
/// );
/// // Raise to 150 commits 150
/// assert_eq!(
///     validate_action(1000, 0, 50, 50, PlayerAction::Raise(150)),
///     Ok(ValidatedAction::Raise(150))
/// );
/// // Short stack calling goes all-in
/// assert_eq!(
///     validate_action(30, 0, 50, 50, PlayerAction::Call),
///     Ok(ValidatedAction::AllIn(30))
/// );
/// ```
pub fn validate_action(
    stack: u32,
    street_bet: u32,
    table_bet: u32,
    min_raise: u32,
    action: A,
) -> Result<ValidatedAction, TableError> {
    let to_call = table_bet.saturating_sub(street_bet);
    match action {
        A::Fold => Ok(ValidatedAction::Fold),
        A::Check => {
            if to_call == 0 {
                Ok(ValidatedAction::Check)
            } else {
                Err(TableError::BetPending { to_call })
            }
        }
        A::Call => {
            if to_call == 0 {
                Err(TableError::NothingToCall)
            } else if stack <= to_call {
                Ok(ValidatedAction::AllIn(stack))
            } else {
                Ok(ValidatedAction::Call(to_call))
            }
        }
        A::Raise(_) if table_bet == 0 => Err(TableError::NothingToRaise),
        A::Bet(target) | A::Raise(target) => {
            let minimum = table_bet.saturating_add(min_raise.max(1));
            if target <= street_bet {
                return Err(TableError::InvalidBetAmount {
                    amount: target,
                    minimum,
                });
            }
            let commit = target - street_bet;
            if commit > stack {
                return Err(TableError::InsufficientChips {
                    needed: commit,
                    available: stack,
                });
            }
            if commit == stack {
                return Ok(ValidatedAction::AllIn(stack));
            }
            if target < minimum {
                return Err(TableError::InvalidBetAmount {
                    amount: target,
                    minimum,
                });
            }
            if table_bet == 0 {
                Ok(ValidatedAction::Bet(commit))
            } else {
                Ok(ValidatedAction::Raise(commit))
            }
        }
        A::AllIn => {
            if stack == 0 {
                Err(TableError::PlayerAllIn)
            } else {
                Ok(ValidatedAction::AllIn(stack))
            }
        }
    }
}
