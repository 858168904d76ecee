//! Domain model for registered target databases.
//!
//! A target names a `PostgreSQL` connection that pins run their queries
//! against. Names are slugs unique among live targets, and every mutation is
//! guarded by the shared optimistic-locking [`Version`](crate::version::Version).

mod error;
mod ids;
mod target;
mod url;

pub use error::TargetDomainError;
pub use ids::{TargetId, TargetName};
pub use target::{PersistedTargetData, Target};
pub use url::TargetUrl;
