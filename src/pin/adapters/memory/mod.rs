//! In-memory adapter for pin persistence.

mod repository;

pub use repository::InMemoryPinRepository;
