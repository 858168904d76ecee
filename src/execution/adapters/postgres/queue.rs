//! Pin queue stored in the registry database.
//!
//! Enqueue inserts a row; dequeue deletes the oldest row not locked by
//! another consumer. Several worker processes can share the table.

use crate::execution::ports::{PinQueue, PinQueueError, PinQueueResult};
use crate::pin::domain::PinId;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// `PostgreSQL` connection pool type used by the queue adapter.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

diesel::table! {
    /// Pending pin executions.
    pin_queue (id) {
        /// Arrival order.
        id -> Int8,
        /// Pin to execute.
        pin_id -> Uuid,
        /// Enqueue timestamp.
        enqueued_at -> Timestamptz,
    }
}

#[derive(Debug, QueryableByName)]
struct DequeuedRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pin_id: uuid::Uuid,
}

/// Table-backed pin queue.
#[derive(Debug, Clone)]
pub struct PostgresPinQueue {
    pool: QueuePgPool,
}

impl PostgresPinQueue {
    /// Creates a queue over a registry connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PinQueueResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PinQueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PinQueueError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PinQueueError::persistence)?
    }

    async fn try_dequeue(&self) -> PinQueueResult<Option<PinId>> {
        self.run_blocking(|connection| {
            let row = diesel::sql_query(concat!(
                "DELETE FROM pin_queue WHERE id = (",
                "SELECT id FROM pin_queue ORDER BY id FOR UPDATE SKIP LOCKED LIMIT 1",
                ") RETURNING pin_id",
            ))
            .get_result::<DequeuedRow>(connection)
            .optional()
            .map_err(PinQueueError::persistence)?;
            Ok(row.map(|found| PinId::from_uuid(found.pin_id)))
        })
        .await
    }
}

#[async_trait]
impl PinQueue for PostgresPinQueue {
    async fn enqueue(&self, pin_id: PinId) -> PinQueueResult<()> {
        self.run_blocking(move |connection| {
            diesel::insert_into(pin_queue::table)
                .values((
                    pin_queue::pin_id.eq(pin_id.into_inner()),
                    pin_queue::enqueued_at.eq(Utc::now()),
                ))
                .execute(connection)
                .map_err(PinQueueError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn dequeue(&self, wait: Duration) -> PinQueueResult<Option<PinId>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(pin_id) = self.try_dequeue().await? {
                return Ok(Some(pin_id));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            sleep(remaining.min(POLL_INTERVAL)).await;
        }
    }
}
