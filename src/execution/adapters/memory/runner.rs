//! Deterministic query runner driven by a table of canned responses.

use crate::execution::domain::{QueryLimits, QueryRunError, ResultSet, ResultSetBuilder};
use crate::execution::ports::QueryRunner;
use crate::pin::domain::PinQuery;
use crate::target::domain::TargetUrl;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::RwLock;

/// Canned response for one query text.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Return these columns and rows, subject to the row cap.
    Rows {
        /// Column names.
        fields: Vec<String>,
        /// Row values.
        rows: Vec<Vec<Value>>,
    },
    /// Fail as the target database would, with this message.
    DatabaseError(String),
    /// Fail as an unreachable target would.
    ConnectionRefused,
    /// Fail inside the runner itself.
    Fault(String),
}

impl ScriptedResponse {
    /// Builds a row response from string column names.
    #[must_use]
    pub fn rows<I, S>(fields: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Rows {
            fields: fields.into_iter().map(Into::into).collect(),
            rows,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, ScriptedResponse>,
    unreachable: HashSet<String>,
    calls: Vec<String>,
}

/// Query runner for tests and local development.
///
/// Responses are keyed by exact query text. URLs registered as unreachable
/// fail with a connection error regardless of the query. Queries without a
/// response fail with a database error.
#[derive(Debug, Default)]
pub struct ScriptedQueryRunner {
    script: RwLock<Script>,
}

impl ScriptedQueryRunner {
    /// Creates a runner with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response for `query`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`QueryRunError::Runtime`] when the script lock is poisoned.
    pub fn respond(
        &self,
        query: impl Into<String>,
        response: ScriptedResponse,
    ) -> Result<(), QueryRunError> {
        self.script
            .write()
            .map_err(|err| poisoned(&err))?
            .responses
            .insert(query.into(), response);
        Ok(())
    }

    /// Makes every query against `url` fail to connect.
    ///
    /// # Errors
    ///
    /// Returns [`QueryRunError::Runtime`] when the script lock is poisoned.
    pub fn refuse_connections_to(&self, url: &TargetUrl) -> Result<(), QueryRunError> {
        self.script
            .write()
            .map_err(|err| poisoned(&err))?
            .unreachable
            .insert(url.expose().to_owned());
        Ok(())
    }

    /// Returns the query texts run so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryRunError::Runtime`] when the script lock is poisoned.
    pub fn calls(&self) -> Result<Vec<String>, QueryRunError> {
        Ok(self
            .script
            .read()
            .map_err(|err| poisoned(&err))?
            .calls
            .clone())
    }
}

fn poisoned(err: &impl std::fmt::Display) -> QueryRunError {
    QueryRunError::runtime(io::Error::other(err.to_string()))
}

fn collect(
    fields: Vec<String>,
    rows: Vec<Vec<Value>>,
    max_rows: usize,
) -> Result<ResultSet, QueryRunError> {
    let mut builder = ResultSetBuilder::new(fields, max_rows);
    for row in rows {
        builder.push(row)?;
    }
    Ok(builder.finish())
}

#[async_trait]
impl QueryRunner for ScriptedQueryRunner {
    async fn run(
        &self,
        url: &TargetUrl,
        query: &PinQuery,
        limits: QueryLimits,
    ) -> Result<ResultSet, QueryRunError> {
        let response = {
            let mut script = self.script.write().map_err(|err| poisoned(&err))?;
            script.calls.push(query.as_str().to_owned());
            if script.unreachable.contains(url.expose()) {
                ScriptedResponse::ConnectionRefused
            } else {
                script
                    .responses
                    .get(query.as_str())
                    .cloned()
                    .unwrap_or_else(|| {
                        ScriptedResponse::DatabaseError(format!(
                            "no scripted response for query: {}",
                            query.as_str()
                        ))
                    })
            }
        };

        match response {
            ScriptedResponse::Rows { fields, rows } => collect(fields, rows, limits.max_rows),
            ScriptedResponse::DatabaseError(message) => Err(QueryRunError::Database { message }),
            ScriptedResponse::ConnectionRefused => Err(QueryRunError::Connection {
                detail: String::from("connection refused"),
            }),
            ScriptedResponse::Fault(reason) => Err(QueryRunError::runtime(io::Error::other(reason))),
        }
    }
}
