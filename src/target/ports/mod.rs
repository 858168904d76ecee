//! Port contracts for the target registry.

pub mod cipher;
pub mod repository;

pub use cipher::{CipherError, UrlCipher};
pub use repository::{TargetFilter, TargetRepository, TargetRepositoryError, TargetRepositoryResult};
