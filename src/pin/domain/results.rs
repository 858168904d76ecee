//! Outcome of the last committed pin execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages recorded for failures the worker classifies itself.
pub mod messages {
    /// Recorded when the target database cannot be reached.
    pub const CONNECTION_FAILED: &str = "could not connect to database";
    /// Recorded when the query returns more rows than the configured cap.
    pub const TOO_MANY_ROWS: &str = "too many rows in query results";
}

/// Result of one execution: either a result set or an error message.
///
/// A pin that has never run has no `PinResults` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PinResults {
    /// The query succeeded within the row cap.
    Rows {
        /// Column names in select-list order.
        fields: Vec<String>,
        /// Row values in result order.
        rows: Vec<Vec<Value>>,
    },
    /// The query failed or its result was rejected.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl PinResults {
    /// Builds an error outcome.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns the column names of a successful outcome.
    #[must_use]
    pub fn fields(&self) -> Option<&[String]> {
        match self {
            Self::Rows { fields, .. } => Some(fields),
            Self::Error { .. } => None,
        }
    }

    /// Returns the rows of a successful outcome.
    #[must_use]
    pub fn rows(&self) -> Option<&[Vec<Value>]> {
        match self {
            Self::Rows { rows, .. } => Some(rows),
            Self::Error { .. } => None,
        }
    }

    /// Returns the message of a failed outcome.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Rows { .. } => None,
            Self::Error { message } => Some(message),
        }
    }
}
