//! Port contracts for the pin registry.

pub mod repository;

pub use repository::{PinFilter, PinRepository, PinRepositoryError, PinRepositoryResult};
