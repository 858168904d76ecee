//! Pinboard: scheduled execution of pinned SQL queries.
//!
//! Users register target `PostgreSQL` databases and pin named queries to
//! them. A scheduler periodically queues pins whose refresh interval has
//! elapsed, and workers execute them against their targets and store the
//! latest outcome on the pin.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage, encryption, queueing,
//!   and query execution
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//! - **Services**: Orchestration over the ports
//!
//! # Modules
//!
//! - [`target`]: Target database registry with sealed connection URLs
//! - [`pin`]: Pin registry and per-pin execution state
//! - [`execution`]: Scheduler, row reservation, and query worker
//! - [`config`]: Layered process configuration

pub mod config;
pub mod error;
pub mod execution;
pub mod pin;
pub mod schema;
pub mod store;
pub mod target;
pub mod telemetry;
pub mod version;

mod slug;

#[cfg(test)]
mod test_support;
