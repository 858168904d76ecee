//! Thread-safe in-memory target repository.
//!
//! Rows hold the sealed URL exactly as the `PostgreSQL` adapter does, so the
//! cipher is exercised on every read and write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::target::{
    domain::{PersistedTargetData, Target, TargetId, TargetName, TargetUrl},
    ports::{TargetFilter, TargetRepository, TargetRepositoryError, TargetRepositoryResult, UrlCipher},
};
use crate::version::Version;

#[derive(Debug, Clone)]
struct StoredTarget {
    id: TargetId,
    name: TargetName,
    sealed_url: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: Version,
}

impl StoredTarget {
    const fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// In-memory target repository for tests and single-process use.
#[derive(Clone)]
pub struct InMemoryTargetRepository {
    cipher: Arc<dyn UrlCipher>,
    state: Arc<RwLock<HashMap<TargetId, StoredTarget>>>,
}

impl InMemoryTargetRepository {
    /// Creates an empty repository that seals URLs with `cipher`.
    #[must_use]
    pub fn new(cipher: Arc<dyn UrlCipher>) -> Self {
        Self {
            cipher,
            state: Arc::default(),
        }
    }

    fn seal(&self, target: &Target) -> TargetRepositoryResult<StoredTarget> {
        let sealed_url = self.cipher.seal(target.url().expose())?;
        Ok(StoredTarget {
            id: target.id(),
            name: target.name().clone(),
            sealed_url,
            created_at: target.created_at(),
            updated_at: target.updated_at(),
            deleted_at: target.deleted_at(),
            version: target.version(),
        })
    }

    fn open(&self, stored: &StoredTarget) -> TargetRepositoryResult<Target> {
        let plaintext = self.cipher.open(&stored.sealed_url)?;
        let url = TargetUrl::new(plaintext).map_err(TargetRepositoryError::invalid_persisted_data)?;
        Ok(Target::from_persisted(PersistedTargetData {
            id: stored.id,
            name: stored.name.clone(),
            url,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            deleted_at: stored.deleted_at,
            version: stored.version,
        }))
    }
}

fn lock_error(err: &impl std::fmt::Display) -> TargetRepositoryError {
    TargetRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

fn name_taken(
    rows: &HashMap<TargetId, StoredTarget>,
    name: &TargetName,
    excluding: TargetId,
) -> bool {
    rows.values()
        .any(|row| row.is_live() && row.id != excluding && &row.name == name)
}

#[async_trait]
impl TargetRepository for InMemoryTargetRepository {
    async fn insert(&self, target: &Target) -> TargetRepositoryResult<()> {
        let stored = self.seal(target)?;
        let mut rows = self.state.write().map_err(|err| lock_error(&err))?;
        if !target.is_deleted() && name_taken(&rows, target.name(), target.id()) {
            return Err(TargetRepositoryError::DuplicateName(target.name().clone()));
        }
        rows.insert(stored.id, stored);
        Ok(())
    }

    async fn update(&self, target: &Target, expected: Version) -> TargetRepositoryResult<()> {
        let stored = self.seal(target)?;
        let mut rows = self.state.write().map_err(|err| lock_error(&err))?;
        let current = rows
            .get(&target.id())
            .ok_or(TargetRepositoryError::NotFound(target.id()))?;
        if current.version != expected {
            return Err(TargetRepositoryError::ConcurrentUpdate {
                id: target.id(),
                expected,
            });
        }
        if !target.is_deleted() && name_taken(&rows, target.name(), target.id()) {
            return Err(TargetRepositoryError::DuplicateName(target.name().clone()));
        }
        rows.insert(stored.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: TargetId) -> TargetRepositoryResult<Option<Target>> {
        let stored = self.state.read().map_err(|err| lock_error(&err))?.get(&id).cloned();
        stored.map(|row| self.open(&row)).transpose()
    }

    async fn find_live_by_name(
        &self,
        name: &TargetName,
    ) -> TargetRepositoryResult<Option<Target>> {
        let stored = self
            .state
            .read()
            .map_err(|err| lock_error(&err))?
            .values()
            .find(|row| row.is_live() && &row.name == name)
            .cloned();
        stored.map(|row| self.open(&row)).transpose()
    }

    async fn list(&self, filter: &TargetFilter) -> TargetRepositoryResult<Vec<Target>> {
        let mut stored: Vec<StoredTarget> = self
            .state
            .read()
            .map_err(|err| lock_error(&err))?
            .values()
            .filter(|row| row.is_live())
            .cloned()
            .collect();
        stored.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));

        let mut targets = Vec::with_capacity(stored.len());
        for row in &stored {
            let target = self.open(row)?;
            if filter.matches(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }
}
