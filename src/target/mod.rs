//! Target registry.
//!
//! Targets are the named `PostgreSQL` connections that pins run against. The
//! connection URL is sealed before it is stored and opened on every read. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
