//! `PostgreSQL` adapters for the execution ports.

mod queue;
mod runner;
mod values;

pub use queue::{PostgresPinQueue, QueuePgPool};
pub use runner::PostgresQueryRunner;
