//! Per-test schema provisioning for `PostgreSQL` integration tests.

use std::sync::Arc;

use chrono::TimeDelta;
use diesel::Connection;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use mockable::DefaultClock;
use pinboard::config::DatabaseConfig;
use pinboard::execution::{
    adapters::postgres::{PostgresPinQueue, PostgresQueryRunner},
    domain::ExecutionSettings,
    services::PinWorker,
};
use pinboard::pin::adapters::postgres::PostgresPinRepository;
use pinboard::pin::services::PinRegistryService;
use pinboard::store::{self, RegistryPool};
use pinboard::target::adapters::{AesGcmUrlCipher, postgres::PostgresTargetRepository};
use pinboard::target::ports::UrlCipher;
use pinboard::target::services::TargetRegistryService;
use uuid::Uuid;

/// Boxed error type for test setup.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Environment variable naming the server used by these tests.
pub const DATABASE_URL_ENV: &str = "PINBOARD_TEST_DATABASE_URL";

/// A migrated schema private to one test, dropped when the value is.
pub struct TestDatabase {
    base_url: String,
    schema: String,
    url: String,
    pool: RegistryPool,
}

impl TestDatabase {
    /// Creates and migrates a fresh schema, or returns `None` when no server
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be created or migrated.
    pub fn provision() -> Result<Option<Self>, BoxError> {
        let Ok(base_url) = std::env::var(DATABASE_URL_ENV) else {
            return Ok(None);
        };
        let schema = format!("pinboard_test_{}", Uuid::new_v4().simple());
        PgConnection::establish(&base_url)?.batch_execute(&format!("CREATE SCHEMA {schema}"))?;

        let separator = if base_url.contains('?') { '&' } else { '?' };
        let url = format!("{base_url}{separator}options=-csearch_path%3D{schema}");
        let pool = store::connect(&DatabaseConfig {
            url: url.clone(),
            pool_size: 2,
            ..DatabaseConfig::default()
        })?;
        pinboard::schema::apply(&mut *pool.get()?)?;

        Ok(Some(Self {
            base_url,
            schema,
            url,
            pool,
        }))
    }

    /// Returns a URL whose sessions resolve tables in this schema.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the name of this test's schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the registry pool bound to this schema.
    pub fn pool(&self) -> RegistryPool {
        self.pool.clone()
    }

    fn repositories(&self) -> (Arc<PostgresTargetRepository>, Arc<PostgresPinRepository>) {
        let cipher: Arc<dyn UrlCipher> = Arc::new(
            AesGcmUrlCipher::new(&[vec![3; 32]], TimeDelta::days(30), Arc::new(DefaultClock))
                .expect("key should be valid"),
        );
        (
            Arc::new(PostgresTargetRepository::new(self.pool(), cipher)),
            Arc::new(PostgresPinRepository::new(self.pool())),
        )
    }

    /// Builds registry services over this schema.
    pub fn registries(&self) -> Registries {
        let clock = Arc::new(DefaultClock);
        let (targets, pins) = self.repositories();
        Registries {
            targets: TargetRegistryService::new(
                Arc::clone(&targets),
                Arc::clone(&pins),
                Arc::clone(&clock),
            ),
            pins: PinRegistryService::new(pins, targets, clock),
        }
    }

    /// Builds a worker over the `PostgreSQL` adapters of this schema.
    pub fn worker(&self, settings: ExecutionSettings) -> PostgresWorker {
        let (targets, pins) = self.repositories();
        PinWorker::new(
            pins,
            targets,
            Arc::new(PostgresQueryRunner::new()),
            Arc::new(PostgresPinQueue::new(self.pool())),
            Arc::new(DefaultClock),
            settings,
        )
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let dropped = PgConnection::establish(&self.base_url)
            .map_err(BoxError::from)
            .and_then(|mut connection| {
                connection
                    .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema))
                    .map_err(BoxError::from)
            });
        if let Err(err) = dropped {
            tracing::warn!(schema = %self.schema, error = %err, "failed to drop test schema");
        }
    }
}

/// Worker wired to the `PostgreSQL` adapters.
pub type PostgresWorker = PinWorker<
    PostgresPinRepository,
    PostgresTargetRepository,
    PostgresQueryRunner,
    PostgresPinQueue,
    DefaultClock,
>;

/// Registry services over one test schema.
pub struct Registries {
    /// Target registry.
    pub targets:
        TargetRegistryService<PostgresTargetRepository, PostgresPinRepository, DefaultClock>,
    /// Pin registry.
    pub pins: PinRegistryService<PostgresPinRepository, PostgresTargetRepository, DefaultClock>,
}
