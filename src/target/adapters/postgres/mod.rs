//! `PostgreSQL` adapter for target persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTargetRepository, TargetPgPool};
