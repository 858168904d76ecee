//! Query runner backed by the blocking `postgres` client.

use std::time::Duration;

use super::values::encode_row;
use crate::execution::domain::{QueryLimits, QueryRunError, ResultSet, ResultSetBuilder};
use crate::execution::ports::QueryRunner;
use crate::pin::domain::PinQuery;
use crate::target::domain::TargetUrl;
use async_trait::async_trait;
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls};
use tracing::debug;

const APPLICATION_NAME: &str = "pinboard-worker";

/// Runs pinned queries over a fresh session per execution.
///
/// Each run opens its own connection with the configured connect timeout and
/// a session-level `statement_timeout`, so a slow query is cancelled by the
/// server and reported as a database error. Session options already present
/// in the target URL, such as a `search_path`, are kept.
///
/// Queries run as a single prepared statement. Text holding several
/// statements is rejected by the server and recorded as that error.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresQueryRunner;

impl PostgresQueryRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryRunner for PostgresQueryRunner {
    async fn run(
        &self,
        url: &TargetUrl,
        query: &PinQuery,
        limits: QueryLimits,
    ) -> Result<ResultSet, QueryRunError> {
        let connection_url = url.expose().to_owned();
        let sql = query.as_str().to_owned();
        tokio::task::spawn_blocking(move || run_blocking(&connection_url, &sql, limits))
            .await
            .map_err(QueryRunError::runtime)?
    }
}

fn connect(url: &str, limits: QueryLimits) -> Result<Client, QueryRunError> {
    let mut config = url
        .parse::<Config>()
        .map_err(|err| QueryRunError::Connection {
            detail: err.to_string(),
        })?;
    let options = session_options(config.get_options(), limits.statement_timeout);
    config
        .connect_timeout(limits.connect_timeout)
        .application_name(APPLICATION_NAME)
        .options(&options);
    config.connect(NoTls).map_err(|err| QueryRunError::Connection {
        detail: err.to_string(),
    })
}

/// Appends the statement timeout to the URL's own startup options.
fn session_options(existing: Option<&str>, statement_timeout: Duration) -> String {
    let timeout = format!("-c statement_timeout={}", statement_timeout.as_millis());
    match existing.map(str::trim).filter(|options| !options.is_empty()) {
        Some(options) => format!("{options} {timeout}"),
        None => timeout,
    }
}

fn run_blocking(url: &str, sql: &str, limits: QueryLimits) -> Result<ResultSet, QueryRunError> {
    let mut client = connect(url, limits)?;

    let statement = client.prepare(sql).map_err(|err| classify_driver_error(&err))?;
    let fields = statement
        .columns()
        .iter()
        .map(|column| column.name().to_owned())
        .collect();
    let mut builder = ResultSetBuilder::new(fields, limits.max_rows);

    let mut rows = client
        .query_raw(&statement, std::iter::empty::<&dyn ToSql>())
        .map_err(|err| classify_driver_error(&err))?;
    while let Some(row) = rows.next().map_err(|err| classify_driver_error(&err))? {
        let values = encode_row(&row).map_err(|err| QueryRunError::Database {
            message: format!("could not decode query results: {err}"),
        })?;
        builder.push(values)?;
    }

    let result_set = builder.finish();
    debug!(rows = result_set.rows.len(), "query completed");
    Ok(result_set)
}

/// Errors reported by the server carry its message verbatim; anything else
/// means the session broke.
fn classify_driver_error(err: &postgres::Error) -> QueryRunError {
    err.as_db_error().map_or_else(
        || QueryRunError::Connection {
            detail: err.to_string(),
        },
        |db_error| QueryRunError::Database {
            message: db_error.message().to_owned(),
        },
    )
}
