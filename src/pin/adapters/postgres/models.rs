//! Diesel row models for pin persistence.

use super::schema::pins;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for pin records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = pins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PinRow {
    /// Pin identifier.
    pub id: uuid::Uuid,
    /// Slug name.
    pub name: String,
    /// Referenced target.
    pub target_id: uuid::Uuid,
    /// Query text.
    pub query: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last scheduling timestamp.
    pub scheduled_at: DateTime<Utc>,
    /// Start of the last execution attempt.
    pub query_started_at: Option<DateTime<Utc>>,
    /// Completion of the last committed execution.
    pub query_finished_at: Option<DateTime<Utc>>,
    /// Column names JSON array.
    pub results_fields: Option<Value>,
    /// Rows JSON array.
    pub results_rows: Option<Value>,
    /// Error message.
    pub results_error: Option<String>,
    /// Reservation marker.
    pub reserved_at: Option<DateTime<Utc>>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: i64,
}

/// Insert and update model for pin records.
///
/// Nullable columns are written as `NULL` when unset so an update fully
/// replaces the previous outcome.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = pins, treat_none_as_null = true)]
pub struct PinValues {
    /// Pin identifier.
    pub id: uuid::Uuid,
    /// Slug name.
    pub name: String,
    /// Referenced target.
    pub target_id: uuid::Uuid,
    /// Query text.
    pub query: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last scheduling timestamp.
    pub scheduled_at: DateTime<Utc>,
    /// Start of the last execution attempt.
    pub query_started_at: Option<DateTime<Utc>>,
    /// Completion of the last committed execution.
    pub query_finished_at: Option<DateTime<Utc>>,
    /// Column names JSON array.
    pub results_fields: Option<Value>,
    /// Rows JSON array.
    pub results_rows: Option<Value>,
    /// Error message.
    pub results_error: Option<String>,
    /// Reservation marker.
    pub reserved_at: Option<DateTime<Utc>>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-locking version.
    pub version: i64,
}
