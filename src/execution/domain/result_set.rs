//! Bounded result sets produced by query runners.

use crate::pin::domain::PinResults;
use serde_json::Value;
use thiserror::Error;

/// Column names and rows returned by a successful query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Column names in select-list order.
    pub fields: Vec<String>,
    /// Row values in result order.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Converts the result set into a stored pin outcome.
    #[must_use]
    pub fn into_results(self) -> PinResults {
        PinResults::Rows {
            fields: self.fields,
            rows: self.rows,
        }
    }
}

/// Raised as soon as a result set grows past its cap.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("query returned more than {max_rows} rows")]
pub struct RowLimitExceeded {
    /// The configured cap.
    pub max_rows: usize,
}

/// Accumulates rows while enforcing the row cap.
///
/// Runners push rows one at a time as they stream from the driver and stop
/// reading at the first rejected push, so an oversized result is never
/// buffered.
#[derive(Debug)]
pub struct ResultSetBuilder {
    fields: Vec<String>,
    rows: Vec<Vec<Value>>,
    max_rows: usize,
}

impl ResultSetBuilder {
    /// Starts a result set with the given columns.
    #[must_use]
    pub const fn new(fields: Vec<String>, max_rows: usize) -> Self {
        Self {
            fields,
            rows: Vec::new(),
            max_rows,
        }
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`RowLimitExceeded`] when the builder already holds
    /// `max_rows` rows; the row is discarded.
    pub fn push(&mut self, row: Vec<Value>) -> Result<(), RowLimitExceeded> {
        if self.rows.len() >= self.max_rows {
            return Err(RowLimitExceeded {
                max_rows: self.max_rows,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Finishes the result set.
    #[must_use]
    pub fn finish(self) -> ResultSet {
        ResultSet {
            fields: self.fields,
            rows: self.rows,
        }
    }
}
