//! Port for handing due pins from the scheduler to workers.

use crate::pin::domain::PinId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for queue operations.
pub type PinQueueResult<T> = Result<T, PinQueueError>;

/// At-least-once delivery of pin identifiers.
///
/// A delivered id is a hint: the worker still claims the pin through its
/// reservation before running it.
#[async_trait]
pub trait PinQueue: Send + Sync {
    /// Enqueues a pin for execution.
    async fn enqueue(&self, pin_id: PinId) -> PinQueueResult<()>;

    /// Waits up to `wait` for the next pin id.
    ///
    /// Returns `None` when nothing arrived in time.
    async fn dequeue(&self, wait: Duration) -> PinQueueResult<Option<PinId>>;
}

/// Errors returned by queue adapters.
#[derive(Debug, Clone, Error)]
pub enum PinQueueError {
    /// The queue no longer accepts or delivers messages.
    #[error("pin queue is closed")]
    Closed,

    /// Queue storage failed.
    #[error("pin queue persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PinQueueError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
