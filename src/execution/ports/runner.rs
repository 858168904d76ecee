//! Port for running a pinned query against its target.

use crate::execution::domain::{QueryLimits, QueryRunError, ResultSet};
use crate::pin::domain::PinQuery;
use crate::target::domain::TargetUrl;
use async_trait::async_trait;

/// Runs SQL verbatim against a target database.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Opens a session to `url`, runs `query`, and collects at most
    /// `limits.max_rows` rows.
    ///
    /// # Errors
    ///
    /// Returns [`QueryRunError`] describing the connection, database, row-cap,
    /// or internal failure.
    async fn run(
        &self,
        url: &TargetUrl,
        query: &PinQuery,
        limits: QueryLimits,
    ) -> Result<ResultSet, QueryRunError>;
}
