//! `PostgreSQL` repository implementation for target storage.

use super::{
    models::{NewTargetRow, TargetChangeset, TargetRow},
    schema::targets,
};
use crate::target::{
    domain::{PersistedTargetData, Target, TargetId, TargetName, TargetUrl},
    ports::{
        TargetFilter, TargetRepository, TargetRepositoryError, TargetRepositoryResult, UrlCipher,
    },
};
use crate::version::Version;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use std::sync::Arc;

/// `PostgreSQL` connection pool type used by target adapters.
pub type TargetPgPool = Pool<ConnectionManager<PgConnection>>;

const LIVE_NAME_INDEX: &str = "idx_targets_live_name";

/// `PostgreSQL`-backed target repository.
#[derive(Clone)]
pub struct PostgresTargetRepository {
    pool: TargetPgPool,
    cipher: Arc<dyn UrlCipher>,
}

impl PostgresTargetRepository {
    /// Creates a new repository from a connection pool and URL cipher.
    #[must_use]
    pub fn new(pool: TargetPgPool, cipher: Arc<dyn UrlCipher>) -> Self {
        Self { pool, cipher }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TargetRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection, &dyn UrlCipher) -> TargetRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TargetRepositoryError::persistence)?;
            f(&mut connection, cipher.as_ref())
        })
        .await
        .map_err(TargetRepositoryError::persistence)?
    }
}

#[async_trait]
impl TargetRepository for PostgresTargetRepository {
    async fn insert(&self, target: &Target) -> TargetRepositoryResult<()> {
        let target_name = target.name().clone();
        let url_encrypted = self.cipher.seal(target.url().expose())?;
        let new_row = NewTargetRow {
            id: target.id().into_inner(),
            name: target.name().as_str().to_owned(),
            url_encrypted,
            created_at: target.created_at(),
            updated_at: target.updated_at(),
            deleted_at: target.deleted_at(),
            version: storage_version(target.version())?,
        };

        self.run_blocking(move |connection, _| {
            diesel::insert_into(targets::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| map_write_error(err, &target_name))?;
            Ok(())
        })
        .await
    }

    async fn update(&self, target: &Target, expected: Version) -> TargetRepositoryResult<()> {
        let target_id = target.id();
        let target_name = target.name().clone();
        let expected_version = storage_version(expected)?;
        let changeset = TargetChangeset {
            name: target.name().as_str().to_owned(),
            url_encrypted: self.cipher.seal(target.url().expose())?,
            updated_at: target.updated_at(),
            deleted_at: target.deleted_at(),
            version: storage_version(target.version())?,
        };

        self.run_blocking(move |connection, _| {
            let updated_count = diesel::update(
                targets::table
                    .filter(targets::id.eq(target_id.into_inner()))
                    .filter(targets::version.eq(expected_version)),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(|err| map_write_error(err, &target_name))?;

            if updated_count == 1 {
                return Ok(());
            }

            let exists = diesel::select(diesel::dsl::exists(
                targets::table.filter(targets::id.eq(target_id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(TargetRepositoryError::persistence)?;
            if exists {
                Err(TargetRepositoryError::ConcurrentUpdate {
                    id: target_id,
                    expected,
                })
            } else {
                Err(TargetRepositoryError::NotFound(target_id))
            }
        })
        .await
    }

    async fn find_by_id(&self, id: TargetId) -> TargetRepositoryResult<Option<Target>> {
        self.run_blocking(move |connection, cipher| {
            let row = targets::table
                .filter(targets::id.eq(id.into_inner()))
                .select(TargetRow::as_select())
                .first::<TargetRow>(connection)
                .optional()
                .map_err(TargetRepositoryError::persistence)?;
            row.map(|found| row_to_target(found, cipher)).transpose()
        })
        .await
    }

    async fn find_live_by_name(
        &self,
        name: &TargetName,
    ) -> TargetRepositoryResult<Option<Target>> {
        let name_str = name.as_str().to_owned();
        self.run_blocking(move |connection, cipher| {
            let row = targets::table
                .filter(targets::name.eq(&name_str))
                .filter(targets::deleted_at.is_null())
                .select(TargetRow::as_select())
                .first::<TargetRow>(connection)
                .optional()
                .map_err(TargetRepositoryError::persistence)?;
            row.map(|found| row_to_target(found, cipher)).transpose()
        })
        .await
    }

    async fn list(&self, filter: &TargetFilter) -> TargetRepositoryResult<Vec<Target>> {
        let target_filter = filter.clone();
        self.run_blocking(move |connection, cipher| {
            let rows = targets::table
                .filter(targets::deleted_at.is_null())
                .order(targets::name.asc())
                .select(TargetRow::as_select())
                .load::<TargetRow>(connection)
                .map_err(TargetRepositoryError::persistence)?;
            let mut listed = Vec::with_capacity(rows.len());
            for row in rows {
                let target = row_to_target(row, cipher)?;
                if target_filter.matches(&target) {
                    listed.push(target);
                }
            }
            Ok(listed)
        })
        .await
    }
}

fn storage_version(version: Version) -> TargetRepositoryResult<i64> {
    version
        .to_storage()
        .map_err(TargetRepositoryError::invalid_persisted_data)
}

fn map_write_error(err: DieselError, name: &TargetName) -> TargetRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if is_name_unique_violation(info.as_ref()) =>
        {
            TargetRepositoryError::DuplicateName(name.clone())
        }
        _ => TargetRepositoryError::persistence(err),
    }
}

fn is_name_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|constraint| constraint == LIVE_NAME_INDEX)
}

fn row_to_target(row: TargetRow, cipher: &dyn UrlCipher) -> TargetRepositoryResult<Target> {
    let TargetRow {
        id,
        name,
        url_encrypted,
        created_at,
        updated_at,
        deleted_at,
        version,
    } = row;

    let parsed_name = TargetName::new(name).map_err(TargetRepositoryError::invalid_persisted_data)?;
    let url = TargetUrl::new(cipher.open(&url_encrypted)?)
        .map_err(TargetRepositoryError::invalid_persisted_data)?;
    let parsed_version =
        Version::from_storage(version).map_err(TargetRepositoryError::invalid_persisted_data)?;

    Ok(Target::from_persisted(PersistedTargetData {
        id: TargetId::from_uuid(id),
        name: parsed_name,
        url,
        created_at,
        updated_at,
        deleted_at,
        version: parsed_version,
    }))
}
