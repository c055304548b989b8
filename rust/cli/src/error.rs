//! Error types for the CLI application.
//!
//! Every command handler returns `Result<(), CliError>`; [`crate::run`] maps
//! any error to exit code `2`.

use gambit_engine::errors::{CardParseError, DeckError, EvalError, TableError};
use gambit_web::{ConfigError, EnforcerError, StoreError};
use std::fmt;

/// Custom error type for CLI operations.
#[derive(Debug)]
pub enum CliError {
    /// I/O error (file operations, stdout/stderr writes, etc.)
    Io(std::io::Error),

    /// Invalid user input or command-line arguments
    InvalidInput(String),

    /// Configuration error
    Config(String),

    /// Engine-related error
    Engine(String),

    /// Shared store could not be opened or queried
    Store(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Engine(msg) => write!(f, "Engine error: {}", msg),
            CliError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        CliError::Io(error)
    }
}

impl From<CardParseError> for CliError {
    fn from(error: CardParseError) -> Self {
        CliError::InvalidInput(error.to_string())
    }
}

impl From<EvalError> for CliError {
    fn from(error: EvalError) -> Self {
        CliError::InvalidInput(error.to_string())
    }
}

impl From<DeckError> for CliError {
    fn from(error: DeckError) -> Self {
        CliError::Engine(error.to_string())
    }
}

impl From<TableError> for CliError {
    fn from(error: TableError) -> Self {
        CliError::Engine(error.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        CliError::Config(error.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(error: StoreError) -> Self {
        CliError::Store(error.to_string())
    }
}

impl From<EnforcerError> for CliError {
    fn from(error: EnforcerError) -> Self {
        CliError::Store(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_kind() {
        let err = CliError::InvalidInput("hands must be >= 1".into());
        assert_eq!(err.to_string(), "Invalid input: hands must be >= 1");
        let err = CliError::from(EvalError::WrongCardCount(3));
        assert!(err.to_string().starts_with("Invalid input:"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let err = CliError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
        assert!(CliError::Config("x".into()).source().is_none());
    }
}
