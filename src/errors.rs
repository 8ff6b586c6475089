//! Error types for the Plaza wallet and casino round controllers
//!
//! Rejected actions never mutate state: a `RoundError` means the round and
//! the wallet look exactly as they did before the call.

use crate::games::types::{GameKind, RoundStatus};
use thiserror::Error;

/// Root error type for all Plaza operations
#[derive(Debug, Error)]
pub enum PlazaError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Persisted key-value store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stake validation and round lifecycle errors
    #[error("Round error: {0}")]
    Round(#[from] RoundError),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Errors surfaced to the player when an action is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("Not enough balance: stake {needed}, balance {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("No bet placed")]
    InvalidStake,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{game} cannot {action} while {from}")]
    InvalidTransition {
        game: GameKind,
        from: RoundStatus,
        action: &'static str,
    },

    #[error("You need at least one safe pick")]
    NothingToCashOut,
}

impl PlazaError {
    /// True for rejections the player can fix by changing the stake or input
    pub fn is_user_error(&self) -> bool {
        matches!(self, PlazaError::Round(_))
    }
}

// External error conversions
impl From<rocksdb::Error> for PlazaError {
    fn from(e: rocksdb::Error) -> Self {
        PlazaError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<std::io::Error> for PlazaError {
    fn from(e: std::io::Error) -> Self {
        PlazaError::Storage(StorageError::ReadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for PlazaError {
    fn from(e: serde_json::Error) -> Self {
        PlazaError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

// Convenience type alias for Results
pub type PlazaResult<T> = Result<T, PlazaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        let config_error = ConfigurationError::ValidationFailed("test".to_string());
        let plaza_error = PlazaError::Configuration(config_error);

        assert!(plaza_error.to_string().contains("Configuration error"));
        assert!(plaza_error.to_string().contains("test"));
    }

    #[test]
    fn test_insufficient_funds_details() {
        let err = RoundError::InsufficientFunds {
            needed: 500,
            available: 120,
        };

        assert!(err.to_string().contains("Not enough balance"));
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn test_invalid_transition_names_game_and_state() {
        let err = RoundError::InvalidTransition {
            game: GameKind::Crash,
            from: RoundStatus::Settled,
            action: "cash out",
        };

        assert_eq!(err.to_string(), "crash cannot cash out while settled");
    }

    #[test]
    fn test_error_conversion() {
        let plaza_error: PlazaError = RoundError::InvalidStake.into();

        assert!(plaza_error.is_user_error());
        match plaza_error {
            PlazaError::Round(RoundError::InvalidStake) => {}
            _ => panic!("Expected round error"),
        }
    }

    #[test]
    fn test_error_source() {
        let storage_error = StorageError::ReadFailed("disk".to_string());
        let plaza_error = PlazaError::Storage(storage_error);

        assert!(plaza_error.source().is_some());
        assert!(!plaza_error.is_user_error());
    }
}
