//! Unified error handling for the foursome crate
//!
//! Every failure carries a machine-distinguishable [`ErrorKind`] together with
//! a human-readable message (the `Display` output).
//!
//! - [`ErrorKind::Precondition`] and [`ErrorKind::Validation`] go back to the
//!   caller for correction and are never retried automatically.
//! - [`ErrorKind::LockConflict`] is always recoverable by retrying later.
//! - [`ErrorKind::Persistence`] covers every store failure.
//! - [`ErrorKind::Assignment`] flags malformed assigner input.
//!
//! # Usage
//!
//! ```rust,ignore
//! use foursome::error::{Error, ErrorKind};
//!
//! fn handle(err: Error) {
//!     match err.kind() {
//!         ErrorKind::LockConflict => println!("Busy, try again: {err}"),
//!         _ => eprintln!("Failed: {err}"),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use crate::models::{PlayerId, WeekId};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Insufficient players, unknown week, schedule already exists
    Precondition,
    /// Regeneration already in progress for the week
    LockConflict,
    /// Invalid manual-edit target or availability inconsistency
    Validation,
    /// Store failure
    Persistence,
    /// Malformed assigner input
    Assignment,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precondition => "precondition",
            Self::LockConflict => "lock_conflict",
            Self::Validation => "validation",
            Self::Persistence => "persistence",
            Self::Assignment => "assignment",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the foursome crate
#[derive(Error, Debug)]
pub enum Error {
    /// Week id has no stored week
    #[error("Week {week_id} not found")]
    WeekNotFound { week_id: WeekId },

    /// A schedule is already active for the week
    #[error("Schedule already exists for week {week_id}")]
    ScheduleExists { week_id: WeekId },

    /// No schedule is active for the week
    #[error("No schedule exists for week {week_id}")]
    ScheduleNotFound { week_id: WeekId },

    /// Too few available players to build a schedule
    #[error("Week {week_id} has {available} available players, at least {required} required")]
    InsufficientPlayers {
        week_id: WeekId,
        available: usize,
        required: usize,
    },

    /// Other precondition failures
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Regeneration lock already held
    #[error("Regeneration already in progress for week {week_id}")]
    LockConflict { week_id: WeekId },

    /// Invalid manual edit or availability inconsistency
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate player ids handed to the assigner
    #[error("Duplicate player ids in assignment input: {duplicates:?}")]
    DuplicatePlayers { duplicates: Vec<PlayerId> },

    /// Other assigner failures
    #[error("Assignment failed: {0}")]
    Assignment(String),

    /// Store failure
    #[error("Persistence error during '{operation}': {reason}")]
    Persistence { operation: String, reason: String },

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Machine-distinguishable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeekNotFound { .. }
            | Self::ScheduleExists { .. }
            | Self::ScheduleNotFound { .. }
            | Self::InsufficientPlayers { .. }
            | Self::Precondition(_) => ErrorKind::Precondition,
            Self::LockConflict { .. } => ErrorKind::LockConflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicatePlayers { .. } | Self::Assignment(_) => ErrorKind::Assignment,
            Self::Persistence { .. } | Self::Database(_) | Self::Json(_) | Self::Io(_) => {
                ErrorKind::Persistence
            }
        }
    }

    /// Check if retrying later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::LockConflict | ErrorKind::Persistence)
    }

    /// Create a generic precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an assignment error
    pub fn assignment(msg: impl Into<String>) -> Self {
        Self::Assignment(msg.into())
    }

    /// Create a persistence error with context
    pub fn persistence(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Snapshot of this error suitable for reporting in results
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable kind + message pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::WeekNotFound { week_id: 1 }.kind(), ErrorKind::Precondition);
        assert_eq!(Error::LockConflict { week_id: 1 }.kind(), ErrorKind::LockConflict);
        assert_eq!(Error::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            Error::DuplicatePlayers { duplicates: vec![3] }.kind(),
            ErrorKind::Assignment
        );
        assert_eq!(Error::persistence("save", "disk full").kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::LockConflict { week_id: 2 }.is_recoverable());
        assert!(Error::persistence("load", "timeout").is_recoverable());
        assert!(!Error::ScheduleExists { week_id: 2 }.is_recoverable());
        assert!(!Error::validation("nope").is_recoverable());
    }

    #[test]
    fn test_insufficient_players_message() {
        let err = Error::InsufficientPlayers {
            week_id: 3,
            available: 2,
            required: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 available"));
        assert!(msg.contains("at least 4"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_error_report() {
        let report = Error::LockConflict { week_id: 9 }.report();
        assert_eq!(report.kind, ErrorKind::LockConflict);
        assert!(report.to_string().starts_with("[lock_conflict]"));
    }
}
