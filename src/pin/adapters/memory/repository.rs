//! Thread-safe in-memory pin repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::pin::{
    domain::{ClaimCutoffs, Pin, PinId, PinName},
    ports::{PinFilter, PinRepository, PinRepositoryError, PinRepositoryResult},
};
use crate::target::domain::TargetId;
use crate::version::Version;

/// In-memory pin repository for tests and single-process use.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPinRepository {
    state: Arc<RwLock<HashMap<PinId, Pin>>>,
}

impl InMemoryPinRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: &impl std::fmt::Display) -> PinRepositoryError {
    PinRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

fn name_taken(rows: &HashMap<PinId, Pin>, pin: &Pin) -> bool {
    !pin.is_deleted()
        && rows
            .values()
            .any(|row| !row.is_deleted() && row.id() != pin.id() && row.name() == pin.name())
}

#[async_trait]
impl PinRepository for InMemoryPinRepository {
    async fn insert(&self, pin: &Pin) -> PinRepositoryResult<()> {
        let mut rows = self.state.write().map_err(|err| lock_error(&err))?;
        if name_taken(&rows, pin) {
            return Err(PinRepositoryError::DuplicateName(pin.name().clone()));
        }
        rows.insert(pin.id(), pin.clone());
        Ok(())
    }

    async fn update(&self, pin: &Pin, expected: Version) -> PinRepositoryResult<()> {
        let mut rows = self.state.write().map_err(|err| lock_error(&err))?;
        let current = rows
            .get(&pin.id())
            .ok_or(PinRepositoryError::NotFound(pin.id()))?;
        if current.version() != expected {
            return Err(PinRepositoryError::ConcurrentUpdate {
                id: pin.id(),
                expected,
            });
        }
        if name_taken(&rows, pin) {
            return Err(PinRepositoryError::DuplicateName(pin.name().clone()));
        }
        rows.insert(pin.id(), pin.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PinId) -> PinRepositoryResult<Option<Pin>> {
        let rows = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(rows.get(&id).cloned())
    }

    async fn find_live_by_name(&self, name: &PinName) -> PinRepositoryResult<Option<Pin>> {
        let rows = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(rows
            .values()
            .find(|pin| !pin.is_deleted() && pin.name() == name)
            .cloned())
    }

    async fn list(&self, filter: &PinFilter) -> PinRepositoryResult<Vec<Pin>> {
        let rows = self.state.read().map_err(|err| lock_error(&err))?;
        let mut pins: Vec<Pin> = rows
            .values()
            .filter(|pin| filter.matches(pin))
            .cloned()
            .collect();
        pins.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));
        Ok(pins)
    }

    async fn count_live_for_target(&self, target_id: TargetId) -> PinRepositoryResult<u64> {
        let rows = self.state.read().map_err(|err| lock_error(&err))?;
        let count = rows
            .values()
            .filter(|pin| !pin.is_deleted() && pin.target_id() == target_id)
            .count();
        u64::try_from(count).map_err(PinRepositoryError::persistence)
    }

    async fn find_claim_candidates(
        &self,
        cutoffs: ClaimCutoffs,
        limit: usize,
    ) -> PinRepositoryResult<Vec<Pin>> {
        let rows = self.state.read().map_err(|err| lock_error(&err))?;
        let mut candidates: Vec<Pin> = rows
            .values()
            .filter(|pin| pin.is_claimable(cutoffs))
            .cloned()
            .collect();
        candidates.sort_by_key(|pin| (pin.scheduled_at(), pin.id()));
        candidates.truncate(limit);
        Ok(candidates)
    }
}
