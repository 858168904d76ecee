//! Repository port for pin persistence and lookup.

use crate::pin::domain::{ClaimCutoffs, Pin, PinId, PinName};
use crate::target::domain::TargetId;
use crate::version::Version;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for pin repository operations.
pub type PinRepositoryResult<T> = Result<T, PinRepositoryError>;

/// Filter applied when listing live pins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinFilter {
    /// Only include pins bound to this target.
    pub target_id: Option<TargetId>,
    /// Only include pins whose `scheduled_at` is strictly earlier.
    pub scheduled_before: Option<DateTime<Utc>>,
}

impl PinFilter {
    /// Returns whether `pin` passes the filter.
    ///
    /// Soft-deleted pins never pass.
    #[must_use]
    pub fn matches(&self, pin: &Pin) -> bool {
        !pin.is_deleted()
            && self.target_id.is_none_or(|target| pin.target_id() == target)
            && self
                .scheduled_before
                .is_none_or(|cutoff| pin.scheduled_at() < cutoff)
    }
}

/// Pin persistence contract.
#[async_trait]
pub trait PinRepository: Send + Sync {
    /// Stores a new pin.
    ///
    /// # Errors
    ///
    /// Returns [`PinRepositoryError::DuplicateName`] when a live pin already
    /// uses the name.
    async fn insert(&self, pin: &Pin) -> PinRepositoryResult<()>;

    /// Replaces the stored row for `pin.id()` when its stored version still
    /// equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`PinRepositoryError::ConcurrentUpdate`] when the stored
    /// version differs, [`PinRepositoryError::NotFound`] when no row has the
    /// identifier, and [`PinRepositoryError::DuplicateName`] on a name
    /// collision.
    async fn update(&self, pin: &Pin, expected: Version) -> PinRepositoryResult<()>;

    /// Finds a pin by identifier, including soft-deleted rows.
    async fn find_by_id(&self, id: PinId) -> PinRepositoryResult<Option<Pin>>;

    /// Finds the live pin with the given name.
    async fn find_live_by_name(&self, name: &PinName) -> PinRepositoryResult<Option<Pin>>;

    /// Returns live pins matching the filter, ordered by name.
    async fn list(&self, filter: &PinFilter) -> PinRepositoryResult<Vec<Pin>>;

    /// Counts live pins bound to `target_id`.
    async fn count_live_for_target(&self, target_id: TargetId) -> PinRepositoryResult<u64>;

    /// Returns up to `limit` live pins a worker may claim, least recently
    /// scheduled first.
    async fn find_claim_candidates(
        &self,
        cutoffs: ClaimCutoffs,
        limit: usize,
    ) -> PinRepositoryResult<Vec<Pin>>;
}

/// Errors returned by pin repository implementations.
#[derive(Debug, Clone, Error)]
pub enum PinRepositoryError {
    /// Another live pin already uses the name.
    #[error("duplicate pin name: {0}")]
    DuplicateName(PinName),

    /// No pin row has the identifier.
    #[error("pin not found: {0}")]
    NotFound(PinId),

    /// The stored version no longer matches the version the caller read.
    #[error("pin {id} changed since version {expected}")]
    ConcurrentUpdate {
        /// Pin that was being updated.
        id: PinId,
        /// Version the caller expected to replace.
        expected: Version,
    },

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PinRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
