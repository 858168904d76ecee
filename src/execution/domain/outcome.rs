//! Classification of query execution failures.

use super::{ResultSet, RowLimitExceeded};
use crate::pin::domain::{PinResults, messages};
use std::sync::Arc;
use thiserror::Error;

/// Why running a pinned query did not produce a result set.
#[derive(Debug, Clone, Error)]
pub enum QueryRunError {
    /// The target could not be reached or refused the session.
    #[error("connection failed: {detail}")]
    Connection {
        /// Driver description, kept for logs only.
        detail: String,
    },

    /// The target database rejected or aborted the query.
    #[error("{message}")]
    Database {
        /// The database's own message.
        message: String,
    },

    /// The result set exceeded the configured row cap.
    #[error(transparent)]
    RowLimit(#[from] RowLimitExceeded),

    /// The runner itself failed; nothing is recorded on the pin.
    #[error("query runner failure: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueryRunError {
    /// Wraps an internal runner failure.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

/// Maps a runner result to the outcome stored on the pin.
///
/// Connection failures, database errors, and oversized results become error
/// outcomes. Runner faults are returned unchanged for the caller to abort on.
///
/// # Errors
///
/// Returns the original error when it is [`QueryRunError::Runtime`].
pub fn classify(outcome: Result<ResultSet, QueryRunError>) -> Result<PinResults, QueryRunError> {
    match outcome {
        Ok(result_set) => Ok(result_set.into_results()),
        Err(QueryRunError::Connection { .. }) => {
            Ok(PinResults::error(messages::CONNECTION_FAILED))
        }
        Err(QueryRunError::Database { message }) => Ok(PinResults::Error { message }),
        Err(QueryRunError::RowLimit(_)) => Ok(PinResults::error(messages::TOO_MANY_ROWS)),
        Err(err @ QueryRunError::Runtime(_)) => Err(err),
    }
}
