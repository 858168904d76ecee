//! In-process pin queue over a Tokio channel.

use crate::execution::ports::{PinQueue, PinQueueError, PinQueueResult};
use crate::pin::domain::PinId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

/// Unbounded in-process queue shared by a scheduler and workers in one
/// process.
#[derive(Debug, Clone)]
pub struct InMemoryPinQueue {
    sender: mpsc::UnboundedSender<PinId>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<PinId>>>,
}

impl Default for InMemoryPinQueue {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl InMemoryPinQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every id currently queued.
    pub async fn drain(&self) -> Vec<PinId> {
        let mut receiver = self.receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(pin_id) = receiver.try_recv() {
            drained.push(pin_id);
        }
        drained
    }
}

#[async_trait]
impl PinQueue for InMemoryPinQueue {
    async fn enqueue(&self, pin_id: PinId) -> PinQueueResult<()> {
        self.sender.send(pin_id).map_err(|_| PinQueueError::Closed)
    }

    async fn dequeue(&self, wait: Duration) -> PinQueueResult<Option<PinId>> {
        let received = timeout(wait, async {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        })
        .await;
        match received {
            Ok(Some(pin_id)) => Ok(Some(pin_id)),
            Ok(None) => Err(PinQueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}
