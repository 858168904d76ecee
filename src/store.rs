//! Registry database connection pool.

use crate::config::DatabaseConfig;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};
use std::time::Duration;

/// Pool shared by the registry repositories and the queue.
pub type RegistryPool = Pool<ConnectionManager<PgConnection>>;

/// Applies the registry statement timeout to each new session.
#[derive(Debug, Clone, Copy)]
struct SessionSettings {
    statement_timeout: Duration,
}

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SessionSettings {
    fn on_acquire(&self, connection: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        connection
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the registry pool and opens its first connection.
///
/// Blocks while connecting.
///
/// # Errors
///
/// Returns [`PoolError`] when no connection can be established within the
/// configured timeout.
pub fn connect(config: &DatabaseConfig) -> Result<RegistryPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.as_str());
    Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
        .connection_customizer(Box::new(SessionSettings {
            statement_timeout: Duration::from_millis(config.statement_timeout_ms),
        }))
        .build(manager)
}
