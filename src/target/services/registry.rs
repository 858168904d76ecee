//! Target registry service: create, look up, update, and retire targets.

use crate::error::{ErrorKind, RegistryFailure, codes};
use crate::pin::ports::{PinRepository, PinRepositoryError};
use crate::target::{
    domain::{Target, TargetDomainError, TargetId, TargetName, TargetUrl},
    ports::{TargetFilter, TargetRepository, TargetRepositoryError},
};
use crate::version::Version;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Request payload for registering a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTargetRequest {
    name: String,
    url: String,
}

impl CreateTargetRequest {
    /// Creates a request from raw, unvalidated fields.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Errors returned by [`TargetRegistryService`].
#[derive(Debug, Error)]
pub enum TargetRegistryError {
    /// A field failed validation.
    #[error(transparent)]
    Domain(#[from] TargetDomainError),

    /// No live target matches the identifier.
    #[error("target not found: {0}")]
    NotFound(String),

    /// Another live target already uses the name.
    #[error("field name is already used by another target: {0}")]
    DuplicateName(TargetName),

    /// The target is still referenced by live pins.
    #[error("target {id} is still referenced by {pins} live pin(s)")]
    HasLivePins {
        /// Target that was being removed.
        id: TargetId,
        /// Number of live pins referencing it.
        pins: u64,
    },

    /// The caller's copy is stale.
    #[error("target {id} was modified concurrently; re-read version newer than {expected}")]
    ConcurrentUpdate {
        /// Target that was being updated.
        id: TargetId,
        /// Version the caller held.
        expected: Version,
    },

    /// Target storage failed.
    #[error(transparent)]
    Repository(TargetRepositoryError),

    /// Pin storage failed while checking references.
    #[error(transparent)]
    PinRepository(#[from] PinRepositoryError),
}

impl From<TargetRepositoryError> for TargetRegistryError {
    fn from(err: TargetRepositoryError) -> Self {
        match err {
            TargetRepositoryError::DuplicateName(name) => Self::DuplicateName(name),
            TargetRepositoryError::NotFound(id) => Self::NotFound(id.to_string()),
            TargetRepositoryError::ConcurrentUpdate { id, expected } => {
                Self::ConcurrentUpdate { id, expected }
            }
            other => Self::Repository(other),
        }
    }
}

impl RegistryFailure for TargetRegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateName(_) | Self::HasLivePins { .. } | Self::ConcurrentUpdate { .. } => {
                ErrorKind::Conflict
            }
            Self::Repository(_) | Self::PinRepository(_) => ErrorKind::System,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Domain(_) => codes::INVALID,
            Self::NotFound(_) => codes::DB_NOT_FOUND,
            Self::DuplicateName(_) => codes::DUPLICATE_DB_NAME,
            Self::HasLivePins { .. } => codes::REMOVING_DB_WITH_PINS,
            Self::ConcurrentUpdate { .. } => codes::DB_CONCURRENT_UPDATE,
            Self::Repository(_) | Self::PinRepository(_) => codes::INTERNAL,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            Self::Domain(err) => Some(err.field()),
            Self::DuplicateName(_) => Some("name"),
            _ => None,
        }
    }
}

/// Result type for target registry operations.
pub type TargetRegistryResult<T> = Result<T, TargetRegistryError>;

/// Orchestrates target validation, uniqueness, and optimistic updates.
#[derive(Clone)]
pub struct TargetRegistryService<R, P, C>
where
    R: TargetRepository,
    P: PinRepository,
    C: Clock + Send + Sync,
{
    targets: Arc<R>,
    pins: Arc<P>,
    clock: Arc<C>,
}

impl<R, P, C> TargetRegistryService<R, P, C>
where
    R: TargetRepository,
    P: PinRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new target registry service.
    #[must_use]
    pub const fn new(targets: Arc<R>, pins: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            targets,
            pins,
            clock,
        }
    }

    /// Validates and stores a new target.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::Domain`] for a malformed name or URL and
    /// [`TargetRegistryError::DuplicateName`] when the name is taken.
    pub async fn create(&self, request: CreateTargetRequest) -> TargetRegistryResult<Target> {
        let name = TargetName::new(request.name)?;
        let url = TargetUrl::new(request.url)?;
        self.ensure_name_available(&name, None).await?;

        let target = Target::new(name, url, &*self.clock);
        self.targets.insert(&target).await?;
        info!(target_id = %target.id(), name = %target.name(), "registered target");
        Ok(target)
    }

    /// Looks up a live target by identifier or name.
    ///
    /// When `id_or_name` parses as a UUID the identifier is tried first and
    /// the name second.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::NotFound`] when no live target matches.
    pub async fn get(&self, id_or_name: &str) -> TargetRegistryResult<Target> {
        if let Some(id) = TargetId::parse(id_or_name) {
            let by_id = self.targets.find_by_id(id).await?;
            if let Some(found) = by_id.filter(|target| !target.is_deleted()) {
                return Ok(found);
            }
        }
        let Ok(name) = TargetName::new(id_or_name) else {
            return Err(TargetRegistryError::NotFound(id_or_name.to_owned()));
        };
        self.targets
            .find_live_by_name(&name)
            .await?
            .ok_or_else(|| TargetRegistryError::NotFound(id_or_name.to_owned()))
    }

    /// Returns the live target with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::NotFound`] when the target is absent or
    /// soft-deleted.
    pub async fn get_live(&self, id: TargetId) -> TargetRegistryResult<Target> {
        self.targets
            .find_by_id(id)
            .await?
            .filter(|target| !target.is_deleted())
            .ok_or_else(|| TargetRegistryError::NotFound(id.to_string()))
    }

    /// Lists live targets.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::Repository`] when storage fails.
    pub async fn list(&self, filter: &TargetFilter) -> TargetRegistryResult<Vec<Target>> {
        Ok(self.targets.list(filter).await?)
    }

    /// Stores a modified copy of a target read earlier.
    ///
    /// The write only succeeds when the stored version still equals
    /// `target.version()`. The returned value is the stored revision; the
    /// argument is consumed either way.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::ConcurrentUpdate`] for a stale copy,
    /// [`TargetRegistryError::NotFound`] for a missing or deleted target, and
    /// [`TargetRegistryError::DuplicateName`] for a name collision.
    pub async fn update(&self, target: Target) -> TargetRegistryResult<Target> {
        self.get_live(target.id()).await?;
        self.ensure_name_available(target.name(), Some(target.id()))
            .await?;
        self.commit(target).await
    }

    /// Soft-deletes a target that no live pin references.
    ///
    /// # Errors
    ///
    /// Returns [`TargetRegistryError::HasLivePins`] while pins still reference
    /// the target and [`TargetRegistryError::NotFound`] when it is absent.
    pub async fn soft_delete(&self, id: TargetId) -> TargetRegistryResult<Target> {
        let mut target = self.get_live(id).await?;
        let pins = self.pins.count_live_for_target(id).await?;
        if pins > 0 {
            return Err(TargetRegistryError::HasLivePins { id, pins });
        }
        target.mark_deleted(&*self.clock);
        let removed = self.commit(target).await?;
        info!(target_id = %id, "removed target");
        Ok(removed)
    }

    async fn commit(&self, target: Target) -> TargetRegistryResult<Target> {
        let expected = target.version();
        let next = target.into_next_revision(&*self.clock);
        self.targets.update(&next, expected).await?;
        debug!(target_id = %next.id(), version = %next.version(), "stored target revision");
        Ok(next)
    }

    async fn ensure_name_available(
        &self,
        name: &TargetName,
        owner: Option<TargetId>,
    ) -> TargetRegistryResult<()> {
        let existing = self.targets.find_live_by_name(name).await?;
        match existing {
            Some(other) if Some(other.id()) != owner => {
                Err(TargetRegistryError::DuplicateName(name.clone()))
            }
            _ => Ok(()),
        }
    }
}
