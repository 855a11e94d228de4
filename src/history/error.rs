//! Error types for history operations

use std::fmt;

use chrono::{DateTime, Utc};

/// Result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur against the history store
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// An append would move time backwards (clock regression). Fatal to that
    /// append only; the store keeps its previous contents.
    OutOfOrder {
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// A range query with start after end
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::OutOfOrder { last, attempted } => write!(
                f,
                "snapshot at {} is older than the last stored snapshot at {}",
                attempted, last
            ),
            HistoryError::InvalidRange { start, end } => {
                write!(f, "invalid time range: start {} is after end {}", start, end)
            }
        }
    }
}

impl std::error::Error for HistoryError {}
