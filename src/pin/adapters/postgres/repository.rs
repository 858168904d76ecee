//! `PostgreSQL` repository implementation for pin storage.

use super::{
    models::{PinRow, PinValues},
    schema::pins,
};
use crate::pin::{
    domain::{ClaimCutoffs, PersistedPinData, Pin, PinId, PinName, PinQuery, PinResults},
    ports::{PinFilter, PinRepository, PinRepositoryError, PinRepositoryResult},
};
use crate::target::domain::TargetId;
use crate::version::Version;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use serde_json::Value;
use std::io;

/// `PostgreSQL` connection pool type used by pin adapters.
pub type PinPgPool = Pool<ConnectionManager<PgConnection>>;

const LIVE_NAME_INDEX: &str = "idx_pins_live_name";

/// `PostgreSQL`-backed pin repository.
#[derive(Debug, Clone)]
pub struct PostgresPinRepository {
    pool: PinPgPool,
}

impl PostgresPinRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: PinPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PinRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PinRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PinRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PinRepositoryError::persistence)?
    }
}

#[async_trait]
impl PinRepository for PostgresPinRepository {
    async fn insert(&self, pin: &Pin) -> PinRepositoryResult<()> {
        let pin_name = pin.name().clone();
        let values = to_values(pin)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(pins::table)
                .values(&values)
                .execute(connection)
                .map_err(|err| map_write_error(err, &pin_name))?;
            Ok(())
        })
        .await
    }

    async fn update(&self, pin: &Pin, expected: Version) -> PinRepositoryResult<()> {
        let pin_id = pin.id();
        let pin_name = pin.name().clone();
        let expected_version = storage_version(expected)?;
        let values = to_values(pin)?;

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                pins::table
                    .filter(pins::id.eq(pin_id.into_inner()))
                    .filter(pins::version.eq(expected_version)),
            )
            .set(&values)
            .execute(connection)
            .map_err(|err| map_write_error(err, &pin_name))?;

            if updated_count == 1 {
                return Ok(());
            }

            let exists = diesel::select(diesel::dsl::exists(
                pins::table.filter(pins::id.eq(pin_id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(PinRepositoryError::persistence)?;
            if exists {
                Err(PinRepositoryError::ConcurrentUpdate {
                    id: pin_id,
                    expected,
                })
            } else {
                Err(PinRepositoryError::NotFound(pin_id))
            }
        })
        .await
    }

    async fn find_by_id(&self, id: PinId) -> PinRepositoryResult<Option<Pin>> {
        self.run_blocking(move |connection| {
            let row = pins::table
                .filter(pins::id.eq(id.into_inner()))
                .select(PinRow::as_select())
                .first::<PinRow>(connection)
                .optional()
                .map_err(PinRepositoryError::persistence)?;
            row.map(row_to_pin).transpose()
        })
        .await
    }

    async fn find_live_by_name(&self, name: &PinName) -> PinRepositoryResult<Option<Pin>> {
        let name_str = name.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = pins::table
                .filter(pins::name.eq(&name_str))
                .filter(pins::deleted_at.is_null())
                .select(PinRow::as_select())
                .first::<PinRow>(connection)
                .optional()
                .map_err(PinRepositoryError::persistence)?;
            row.map(row_to_pin).transpose()
        })
        .await
    }

    async fn list(&self, filter: &PinFilter) -> PinRepositoryResult<Vec<Pin>> {
        let pin_filter = *filter;
        self.run_blocking(move |connection| {
            let mut query = pins::table
                .filter(pins::deleted_at.is_null())
                .select(PinRow::as_select())
                .into_boxed();
            if let Some(target_id) = pin_filter.target_id {
                query = query.filter(pins::target_id.eq(target_id.into_inner()));
            }
            if let Some(cutoff) = pin_filter.scheduled_before {
                query = query.filter(pins::scheduled_at.lt(cutoff));
            }
            let rows = query
                .order(pins::name.asc())
                .load::<PinRow>(connection)
                .map_err(PinRepositoryError::persistence)?;
            rows.into_iter().map(row_to_pin).collect()
        })
        .await
    }

    async fn count_live_for_target(&self, target_id: TargetId) -> PinRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let count = pins::table
                .filter(pins::target_id.eq(target_id.into_inner()))
                .filter(pins::deleted_at.is_null())
                .count()
                .get_result::<i64>(connection)
                .map_err(PinRepositoryError::persistence)?;
            u64::try_from(count).map_err(PinRepositoryError::invalid_persisted_data)
        })
        .await
    }

    async fn find_claim_candidates(
        &self,
        cutoffs: ClaimCutoffs,
        limit: usize,
    ) -> PinRepositoryResult<Vec<Pin>> {
        let row_limit = i64::try_from(limit).map_err(PinRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = pins::table
                .filter(pins::deleted_at.is_null())
                .filter(
                    pins::query_started_at.is_null().or(pins::query_started_at
                        .assume_not_null()
                        .lt(cutoffs.started_before)),
                )
                .filter(
                    pins::reserved_at
                        .is_null()
                        .or(pins::reserved_at.assume_not_null().lt(cutoffs.reserved_before)),
                )
                .order((pins::scheduled_at.asc(), pins::id.asc()))
                .limit(row_limit)
                .select(PinRow::as_select())
                .load::<PinRow>(connection)
                .map_err(PinRepositoryError::persistence)?;
            rows.into_iter().map(row_to_pin).collect()
        })
        .await
    }
}

fn storage_version(version: Version) -> PinRepositoryResult<i64> {
    version
        .to_storage()
        .map_err(PinRepositoryError::invalid_persisted_data)
}

fn map_write_error(err: DieselError, name: &PinName) -> PinRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if is_name_unique_violation(info.as_ref()) =>
        {
            PinRepositoryError::DuplicateName(name.clone())
        }
        _ => PinRepositoryError::persistence(err),
    }
}

fn is_name_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|constraint| constraint == LIVE_NAME_INDEX)
}

fn to_values(pin: &Pin) -> PinRepositoryResult<PinValues> {
    let (results_fields, results_rows, results_error) = match pin.results() {
        None => (None, None, None),
        Some(PinResults::Rows { fields, rows }) => (
            Some(serde_json::to_value(fields).map_err(PinRepositoryError::persistence)?),
            Some(serde_json::to_value(rows).map_err(PinRepositoryError::persistence)?),
            None,
        ),
        Some(PinResults::Error { message }) => (None, None, Some(message.clone())),
    };

    Ok(PinValues {
        id: pin.id().into_inner(),
        name: pin.name().as_str().to_owned(),
        target_id: pin.target_id().into_inner(),
        query: pin.query().as_str().to_owned(),
        created_at: pin.created_at(),
        updated_at: pin.updated_at(),
        scheduled_at: pin.scheduled_at(),
        query_started_at: pin.query_started_at(),
        query_finished_at: pin.query_finished_at(),
        results_fields,
        results_rows,
        results_error,
        reserved_at: pin.reserved_at(),
        deleted_at: pin.deleted_at(),
        version: storage_version(pin.version())?,
    })
}

fn results_from_columns(
    fields: Option<Value>,
    rows: Option<Value>,
    error: Option<String>,
) -> PinRepositoryResult<Option<PinResults>> {
    match (fields, rows, error) {
        (None, None, None) => Ok(None),
        (None, None, Some(message)) => Ok(Some(PinResults::Error { message })),
        (Some(persisted_fields), Some(persisted_rows), None) => Ok(Some(PinResults::Rows {
            fields: serde_json::from_value(persisted_fields)
                .map_err(PinRepositoryError::invalid_persisted_data)?,
            rows: serde_json::from_value(persisted_rows)
                .map_err(PinRepositoryError::invalid_persisted_data)?,
        })),
        _ => Err(PinRepositoryError::invalid_persisted_data(io::Error::other(
            "pin results columns are inconsistent",
        ))),
    }
}

fn row_to_pin(row: PinRow) -> PinRepositoryResult<Pin> {
    let PinRow {
        id,
        name,
        target_id,
        query,
        created_at,
        updated_at,
        scheduled_at,
        query_started_at,
        query_finished_at,
        results_fields,
        results_rows,
        results_error,
        reserved_at,
        deleted_at,
        version,
    } = row;

    let data = PersistedPinData {
        id: PinId::from_uuid(id),
        name: PinName::new(name).map_err(PinRepositoryError::invalid_persisted_data)?,
        target_id: TargetId::from_uuid(target_id),
        query: PinQuery::new(query).map_err(PinRepositoryError::invalid_persisted_data)?,
        created_at,
        updated_at,
        scheduled_at,
        query_started_at,
        query_finished_at,
        results: results_from_columns(results_fields, results_rows, results_error)?,
        reserved_at,
        deleted_at,
        version: Version::from_storage(version)
            .map_err(PinRepositoryError::invalid_persisted_data)?,
    };
    Ok(Pin::from_persisted(data))
}
