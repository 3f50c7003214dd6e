//! Error types for the swap exchange engine
//!
//! This module defines every error the ledger, swap workflow, moderation and
//! replay layers can report. Each variant carries enough context for a caller
//! to tell which record and which state caused the failure.
//!
//! # Error Categories
//!
//! Every variant maps onto one [`ErrorKind`]:
//!
//! - **NotFound**: missing user, item, swap or ledger entry
//! - **InvalidState**: the record is at the wrong lifecycle stage
//! - **Forbidden**: the caller lacks ownership or the admin role
//! - **InvalidArgument**: malformed or inconsistent input
//! - **InsufficientFunds**: balance below the required cost
//! - **InternalFailure**: storage, concurrency and I/O failures (may be retried)

use super::user::{Points, UserId};
use std::fmt;
use thiserror::Error;

/// Record families referenced by errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Item,
    Swap,
    LedgerEntry,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Item => "item",
            Entity::Swap => "swap",
            Entity::LedgerEntry => "ledger entry",
        })
    }
}

/// Coarse classification of an [`ExchangeError`]
///
/// Lets callers decide between "retry won't help", "send different input"
/// and "transient, try again" without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Forbidden,
    InvalidArgument,
    InsufficientFunds,
    InternalFailure,
}

impl ErrorKind {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::InternalFailure)
    }
}

/// Main error type for the exchange engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: Entity,
        /// Identifier that was looked up
        id: u64,
    },

    /// Record is at the wrong lifecycle stage for the requested transition
    #[error("{entity} {id} is {actual}, but {operation} requires {expected}")]
    InvalidState {
        entity: Entity,
        id: u64,
        /// Observed state
        actual: String,
        /// State(s) the operation accepts
        expected: String,
        operation: String,
    },

    /// Caller lacks ownership of the record or the admin role
    #[error("user {actor} is not allowed to {operation}")]
    Forbidden {
        actor: UserId,
        /// Denied action, including its target
        operation: String,
    },

    /// Malformed or inconsistent input
    #[error("invalid {field}: {message}")]
    InvalidArgument {
        /// Offending field
        field: String,
        message: String,
    },

    /// Balance below the cost of the requested purchase
    #[error("insufficient points for user {user}: balance {balance}, required {required}")]
    InsufficientFunds {
        user: UserId,
        balance: Points,
        required: Points,
    },

    /// Balance arithmetic would leave the representable range
    #[error("arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow { operation: String, user: UserId },

    /// A staged record changed between read and commit
    #[error("{entity} {id} was modified concurrently during {operation}")]
    Conflict {
        entity: Entity,
        id: u64,
        operation: String,
    },

    /// The storage layer could not complete the write
    #[error("storage failure: {message}")]
    Storage { message: String },

    /// I/O error while reading commands or writing reports
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Malformed replay input
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for ExchangeError {
    fn from(error: std::io::Error) -> Self {
        ExchangeError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for ExchangeError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        ExchangeError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl ExchangeError {
    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::NotFound { .. } => ErrorKind::NotFound,
            ExchangeError::InvalidState { .. } => ErrorKind::InvalidState,
            ExchangeError::Forbidden { .. } => ErrorKind::Forbidden,
            ExchangeError::InvalidArgument { .. } | ExchangeError::ParseError { .. } => {
                ErrorKind::InvalidArgument
            }
            ExchangeError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ExchangeError::ArithmeticOverflow { .. }
            | ExchangeError::Conflict { .. }
            | ExchangeError::Storage { .. }
            | ExchangeError::IoError { .. } => ErrorKind::InternalFailure,
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: Entity, id: impl Into<u64>) -> Self {
        ExchangeError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(
        entity: Entity,
        id: impl Into<u64>,
        actual: impl fmt::Display,
        expected: &str,
        operation: &str,
    ) -> Self {
        ExchangeError::InvalidState {
            entity,
            id: id.into(),
            actual: actual.to_string(),
            expected: expected.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create a Forbidden error
    pub fn forbidden(actor: UserId, operation: impl Into<String>) -> Self {
        ExchangeError::Forbidden {
            actor,
            operation: operation.into(),
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(field: &str, message: impl Into<String>) -> Self {
        ExchangeError::InvalidArgument {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, balance: Points, required: Points) -> Self {
        ExchangeError::InsufficientFunds {
            user,
            balance,
            required,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        ExchangeError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create a Conflict error
    pub fn conflict(entity: Entity, id: impl Into<u64>, operation: &str) -> Self {
        ExchangeError::Conflict {
            entity,
            id: id.into(),
            operation: operation.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        ExchangeError::Storage {
            message: message.into(),
        }
    }
}
