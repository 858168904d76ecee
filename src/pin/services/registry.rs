//! Pin registry service: CRUD plus the execution bookkeeping the worker and
//! scheduler write through it.

use crate::error::{ErrorKind, RegistryFailure, codes};
use crate::pin::{
    domain::{ClaimCutoffs, Pin, PinDomainError, PinId, PinName, PinQuery, PinResults},
    ports::{PinFilter, PinRepository, PinRepositoryError},
};
use crate::target::{
    domain::TargetId,
    ports::{TargetRepository, TargetRepositoryError},
};
use crate::version::Version;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const RELEASE_ATTEMPTS: usize = 3;

/// Request payload for creating a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePinRequest {
    target_id: TargetId,
    name: String,
    query: String,
}

impl CreatePinRequest {
    /// Creates a request from a target identifier and raw fields.
    #[must_use]
    pub fn new(target_id: TargetId, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            target_id,
            name: name.into(),
            query: query.into(),
        }
    }
}

/// Errors returned by [`PinRegistryService`].
#[derive(Debug, Error)]
pub enum PinRegistryError {
    /// A field failed validation.
    #[error(transparent)]
    Domain(#[from] PinDomainError),

    /// No live pin matches the identifier.
    #[error("pin not found: {0}")]
    NotFound(String),

    /// The referenced target is absent or deleted.
    #[error("target not found: {0}")]
    TargetNotFound(TargetId),

    /// Another live pin already uses the name.
    #[error("field name is already used by another pin: {0}")]
    DuplicateName(PinName),

    /// The caller's copy is stale.
    #[error("pin {id} was modified concurrently; re-read version newer than {expected}")]
    ConcurrentUpdate {
        /// Pin that was being updated.
        id: PinId,
        /// Version the caller held.
        expected: Version,
    },

    /// Pin storage failed.
    #[error(transparent)]
    Repository(PinRepositoryError),

    /// Target storage failed while validating the reference.
    #[error(transparent)]
    TargetRepository(#[from] TargetRepositoryError),
}

impl From<PinRepositoryError> for PinRegistryError {
    fn from(err: PinRepositoryError) -> Self {
        match err {
            PinRepositoryError::DuplicateName(name) => Self::DuplicateName(name),
            PinRepositoryError::NotFound(id) => Self::NotFound(id.to_string()),
            PinRepositoryError::ConcurrentUpdate { id, expected } => {
                Self::ConcurrentUpdate { id, expected }
            }
            other => Self::Repository(other),
        }
    }
}

impl RegistryFailure for PinRegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Validation,
            Self::NotFound(_) | Self::TargetNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateName(_) | Self::ConcurrentUpdate { .. } => ErrorKind::Conflict,
            Self::Repository(_) | Self::TargetRepository(_) => ErrorKind::System,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Domain(_) => codes::INVALID,
            Self::NotFound(_) => codes::PIN_NOT_FOUND,
            Self::TargetNotFound(_) => codes::DB_NOT_FOUND,
            Self::DuplicateName(_) => codes::DUPLICATE_PIN_NAME,
            Self::ConcurrentUpdate { .. } => codes::PIN_CONCURRENT_UPDATE,
            Self::Repository(_) | Self::TargetRepository(_) => codes::INTERNAL,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            Self::Domain(err) => Some(err.field()),
            Self::DuplicateName(_) => Some("name"),
            Self::TargetNotFound(_) => Some("db_id"),
            _ => None,
        }
    }
}

/// Result type for pin registry operations.
pub type PinRegistryResult<T> = Result<T, PinRegistryError>;

/// Orchestrates pin validation, uniqueness, and optimistic updates.
#[derive(Clone)]
pub struct PinRegistryService<P, T, C>
where
    P: PinRepository,
    T: TargetRepository,
    C: Clock + Send + Sync,
{
    pins: Arc<P>,
    targets: Arc<T>,
    clock: Arc<C>,
}

impl<P, T, C> PinRegistryService<P, T, C>
where
    P: PinRepository,
    T: TargetRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new pin registry service.
    #[must_use]
    pub const fn new(pins: Arc<P>, targets: Arc<T>, clock: Arc<C>) -> Self {
        Self {
            pins,
            targets,
            clock,
        }
    }

    /// Validates and stores a new pin bound to a live target.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::Domain`] for a malformed name or query,
    /// [`PinRegistryError::TargetNotFound`] when the target is not live, and
    /// [`PinRegistryError::DuplicateName`] when the name is taken.
    pub async fn create(&self, request: CreatePinRequest) -> PinRegistryResult<Pin> {
        let name = PinName::new(request.name)?;
        let query = PinQuery::new(request.query)?;
        self.ensure_target_live(request.target_id).await?;
        self.ensure_name_available(&name, None).await?;

        let pin = Pin::new(name, request.target_id, query, &*self.clock);
        self.pins.insert(&pin).await?;
        info!(pin_id = %pin.id(), target_id = %pin.target_id(), name = %pin.name(), "created pin");
        Ok(pin)
    }

    /// Looks up a live pin by identifier or name.
    ///
    /// When `id_or_name` parses as a UUID the identifier is tried first and
    /// the name second.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::NotFound`] when no live pin matches.
    pub async fn get(&self, id_or_name: &str) -> PinRegistryResult<Pin> {
        if let Some(id) = PinId::parse(id_or_name) {
            let by_id = self.pins.find_by_id(id).await?;
            if let Some(found) = by_id.filter(|pin| !pin.is_deleted()) {
                return Ok(found);
            }
        }
        let Ok(name) = PinName::new(id_or_name) else {
            return Err(PinRegistryError::NotFound(id_or_name.to_owned()));
        };
        self.pins
            .find_live_by_name(&name)
            .await?
            .ok_or_else(|| PinRegistryError::NotFound(id_or_name.to_owned()))
    }

    /// Returns the live pin with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::NotFound`] when the pin is absent or
    /// soft-deleted.
    pub async fn get_live(&self, id: PinId) -> PinRegistryResult<Pin> {
        self.pins
            .find_by_id(id)
            .await?
            .filter(|pin| !pin.is_deleted())
            .ok_or_else(|| PinRegistryError::NotFound(id.to_string()))
    }

    /// Lists live pins.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::Repository`] when storage fails.
    pub async fn list(&self, filter: &PinFilter) -> PinRegistryResult<Vec<Pin>> {
        Ok(self.pins.list(filter).await?)
    }

    /// Stores a modified copy of a pin read earlier.
    ///
    /// The referenced target and name uniqueness are re-checked, and the write
    /// only succeeds when the stored version still equals `pin.version()`.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::ConcurrentUpdate`] for a stale copy,
    /// [`PinRegistryError::TargetNotFound`] when the target is no longer
    /// live, and [`PinRegistryError::DuplicateName`] on a name collision.
    pub async fn update(&self, pin: Pin) -> PinRegistryResult<Pin> {
        self.get_live(pin.id()).await?;
        self.ensure_target_live(pin.target_id()).await?;
        self.ensure_name_available(pin.name(), Some(pin.id())).await?;
        self.commit(pin).await
    }

    /// Soft-deletes a pin.
    ///
    /// # Errors
    ///
    /// Returns [`PinRegistryError::NotFound`] when the pin is absent and
    /// [`PinRegistryError::ConcurrentUpdate`] when it changed mid-call.
    pub async fn soft_delete(&self, id: PinId) -> PinRegistryResult<Pin> {
        let mut pin = self.get_live(id).await?;
        pin.mark_deleted(&*self.clock);
        let removed = self.commit(pin).await?;
        info!(pin_id = %id, "removed pin");
        Ok(removed)
    }

    pub(crate) async fn claim_candidates(
        &self,
        cutoffs: ClaimCutoffs,
        limit: usize,
    ) -> PinRegistryResult<Vec<Pin>> {
        Ok(self.pins.find_claim_candidates(cutoffs, limit).await?)
    }

    /// Advances `scheduled_at` to now.
    pub(crate) async fn reschedule(&self, mut pin: Pin) -> PinRegistryResult<Pin> {
        pin.reschedule(&*self.clock);
        self.commit(pin).await
    }

    /// Sets the reservation marker; the returned token identifies the holder.
    pub(crate) async fn reserve(&self, mut pin: Pin) -> PinRegistryResult<(Pin, DateTime<Utc>)> {
        let token = pin.reserve(&*self.clock);
        let reserved = self.commit(pin).await?;
        Ok((reserved, token))
    }

    pub(crate) async fn mark_started(&self, mut pin: Pin) -> PinRegistryResult<Pin> {
        pin.mark_started(&*self.clock);
        self.commit(pin).await
    }

    pub(crate) async fn record_results(
        &self,
        mut pin: Pin,
        results: PinResults,
    ) -> PinRegistryResult<Pin> {
        pin.record_results(results, &*self.clock);
        self.commit(pin).await
    }

    /// Clears the reservation held under `token`.
    ///
    /// The pin is re-read on every attempt so the release survives version
    /// bumps made by the holder itself. A reservation that was taken over by
    /// another worker, or a pin that disappeared, is left alone.
    pub(crate) async fn release(&self, id: PinId, token: DateTime<Utc>) -> PinRegistryResult<()> {
        let mut last_error = None;
        for _ in 0..RELEASE_ATTEMPTS {
            let Some(mut pin) = self.pins.find_by_id(id).await? else {
                return Ok(());
            };
            if pin.reserved_at() != Some(token) {
                debug!(pin_id = %id, "reservation already cleared or taken over");
                return Ok(());
            }
            pin.release();
            match self.commit(pin).await {
                Ok(_) => return Ok(()),
                Err(err @ PinRegistryError::ConcurrentUpdate { .. }) => {
                    warn!(pin_id = %id, error = %err, "retrying reservation release");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| PinRegistryError::NotFound(id.to_string())))
    }

    async fn commit(&self, pin: Pin) -> PinRegistryResult<Pin> {
        let expected = pin.version();
        let next = pin.into_next_revision(&*self.clock);
        self.pins.update(&next, expected).await?;
        debug!(pin_id = %next.id(), version = %next.version(), "stored pin revision");
        Ok(next)
    }

    async fn ensure_target_live(&self, target_id: TargetId) -> PinRegistryResult<()> {
        let target = self.targets.find_by_id(target_id).await?;
        if target.is_some_and(|found| !found.is_deleted()) {
            Ok(())
        } else {
            Err(PinRegistryError::TargetNotFound(target_id))
        }
    }

    async fn ensure_name_available(
        &self,
        name: &PinName,
        owner: Option<PinId>,
    ) -> PinRegistryResult<()> {
        let existing = self.pins.find_live_by_name(name).await?;
        match existing {
            Some(other) if Some(other.id()) != owner => {
                Err(PinRegistryError::DuplicateName(name.clone()))
            }
            _ => Ok(()),
        }
    }
}
