//! `PostgreSQL` adapter for pin persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PinPgPool, PostgresPinRepository};
