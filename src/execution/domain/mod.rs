//! Domain vocabulary for running pins: settings, bounded result sets, and
//! failure classification.

mod outcome;
mod result_set;
mod settings;

pub use outcome::{QueryRunError, classify};
pub use result_set::{ResultSet, ResultSetBuilder, RowLimitExceeded};
pub use settings::{ExecutionSettings, QueryLimits};
