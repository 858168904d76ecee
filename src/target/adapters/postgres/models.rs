//! Diesel row models for target persistence.

use super::schema::targets;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for target records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = targets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TargetRow {
    /// Target identifier.
    pub id: uuid::Uuid,
    /// Slug name.
    pub name: String,
    /// Sealed connection URL.
    pub url_encrypted: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: i64,
}

/// Insert model for target records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = targets)]
pub struct NewTargetRow {
    /// Target identifier.
    pub id: uuid::Uuid,
    /// Slug name.
    pub name: String,
    /// Sealed connection URL.
    pub url_encrypted: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: i64,
}

/// Column values written by a version-guarded update.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = targets, treat_none_as_null = true)]
pub struct TargetChangeset {
    /// Slug name.
    pub name: String,
    /// Sealed connection URL.
    pub url_encrypted: Vec<u8>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Next version.
    pub version: i64,
}
