//! Target aggregate root.

use super::{TargetId, TargetName, TargetUrl};
use crate::version::Version;
use chrono::{DateTime, Utc};
use mockable::Clock;

/// A registered database connection that pins execute against.
///
/// The aggregate always holds the decrypted [`TargetUrl`]; sealing happens in
/// the repository adapters on the way to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    id: TargetId,
    name: TargetName,
    url: TargetUrl,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: Version,
}

/// Parameter object for reconstructing a persisted target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTargetData {
    /// Persisted identifier.
    pub id: TargetId,
    /// Persisted name.
    pub name: TargetName,
    /// Decrypted connection URL.
    pub url: TargetUrl,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp, if removed.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: Version,
}

impl Target {
    /// Creates a new live target at version 1.
    #[must_use]
    pub fn new(name: TargetName, url: TargetUrl, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TargetId::new(),
            name,
            url,
            created_at: timestamp,
            updated_at: timestamp,
            deleted_at: None,
            version: Version::INITIAL,
        }
    }

    /// Reconstructs a target from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTargetData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            url: data.url,
            created_at: data.created_at,
            updated_at: data.updated_at,
            deleted_at: data.deleted_at,
            version: data.version,
        }
    }

    /// Returns the target identifier.
    #[must_use]
    pub const fn id(&self) -> TargetId {
        self.id
    }

    /// Returns the target name.
    #[must_use]
    pub const fn name(&self) -> &TargetName {
        &self.name
    }

    /// Returns the decrypted connection URL.
    #[must_use]
    pub const fn url(&self) -> &TargetUrl {
        &self.url
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the soft-delete timestamp.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns the version this copy was read at.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns whether the target has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Replaces the target name.
    pub fn rename(&mut self, name: TargetName) {
        self.name = name;
    }

    /// Replaces the connection URL.
    pub fn set_url(&mut self, url: TargetUrl) {
        self.url = url;
    }

    pub(crate) fn mark_deleted(&mut self, clock: &impl Clock) {
        self.deleted_at = Some(clock.utc());
    }

    /// Produces the revision that a successful update will store.
    pub(crate) fn into_next_revision(mut self, clock: &impl Clock) -> Self {
        self.version = self.version.next();
        self.updated_at = clock.utc();
        self
    }
}
