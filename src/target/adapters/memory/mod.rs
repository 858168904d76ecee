//! In-memory adapter for target persistence.

mod repository;

pub use repository::InMemoryTargetRepository;
