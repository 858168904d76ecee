//! Repository port for target persistence and lookup.

use crate::target::domain::{Target, TargetId, TargetName};
use crate::target::ports::CipherError;
use crate::version::Version;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for target repository operations.
pub type TargetRepositoryResult<T> = Result<T, TargetRepositoryError>;

/// Filter applied when listing live targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// Only include targets whose name starts with this prefix.
    pub name_prefix: Option<String>,
}

impl TargetFilter {
    /// Returns whether `target` passes the filter.
    ///
    /// Soft-deleted targets never pass.
    #[must_use]
    pub fn matches(&self, target: &Target) -> bool {
        !target.is_deleted()
            && self
                .name_prefix
                .as_deref()
                .is_none_or(|prefix| target.name().as_str().starts_with(prefix))
    }
}

/// Target persistence contract.
///
/// Implementations seal the connection URL before it reaches storage and open
/// it again on every read.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Stores a new target.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRepositoryError::DuplicateName`] when a live target
    /// already uses the name.
    async fn insert(&self, target: &Target) -> TargetRepositoryResult<()>;

    /// Replaces the stored row for `target.id()` when its stored version still
    /// equals `expected`.
    ///
    /// `target` is the next revision and already carries `expected + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRepositoryError::ConcurrentUpdate`] when the stored
    /// version differs, [`TargetRepositoryError::NotFound`] when no row has
    /// the identifier, and [`TargetRepositoryError::DuplicateName`] when the
    /// new name collides with another live target.
    async fn update(&self, target: &Target, expected: Version) -> TargetRepositoryResult<()>;

    /// Finds a target by identifier, including soft-deleted rows.
    async fn find_by_id(&self, id: TargetId) -> TargetRepositoryResult<Option<Target>>;

    /// Finds the live target with the given name.
    async fn find_live_by_name(&self, name: &TargetName)
    -> TargetRepositoryResult<Option<Target>>;

    /// Returns live targets matching the filter, ordered by name.
    async fn list(&self, filter: &TargetFilter) -> TargetRepositoryResult<Vec<Target>>;
}

/// Errors returned by target repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TargetRepositoryError {
    /// Another live target already uses the name.
    #[error("duplicate target name: {0}")]
    DuplicateName(TargetName),

    /// No target row has the identifier.
    #[error("target not found: {0}")]
    NotFound(TargetId),

    /// The stored version no longer matches the version the caller read.
    #[error("target {id} changed since version {expected}")]
    ConcurrentUpdate {
        /// Target that was being updated.
        id: TargetId,
        /// Version the caller expected to replace.
        expected: Version,
    },

    /// Sealing or opening the connection URL failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TargetRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
