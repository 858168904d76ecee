//! Periodic scheduler that queues pins whose refresh interval has elapsed.

use crate::execution::domain::ExecutionSettings;
use crate::execution::ports::{PinQueue, PinQueueError};
use crate::pin::{
    domain::{Pin, PinId, window_start},
    ports::{PinFilter, PinRepository},
    services::{PinRegistryError, PinRegistryService},
};
use crate::target::ports::TargetRepository;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Errors raised while scheduling pins.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Listing or rescheduling a pin failed.
    #[error(transparent)]
    Registry(#[from] PinRegistryError),

    /// The queue rejected an execution request.
    #[error(transparent)]
    Queue(#[from] PinQueueError),
}

/// Summary of one scheduler pass.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Pins rescheduled and queued, in listing order.
    pub enqueued: Vec<PinId>,
    /// Pins that could not be scheduled this pass.
    pub failures: Vec<(PinId, SchedulerError)>,
}

impl TickReport {
    /// Returns `true` when the pass touched no pin.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.enqueued.is_empty() && self.failures.is_empty()
    }
}

/// Moves due pins onto the queue.
///
/// Rescheduling is a version-checked write, so two schedulers racing on the
/// same pin queue it once; the loser records a conflict for that pin and
/// carries on.
pub struct PinScheduler<P, T, Q, C>
where
    P: PinRepository,
    T: TargetRepository,
    Q: PinQueue,
    C: Clock + Send + Sync,
{
    pins: PinRegistryService<P, T, C>,
    queue: Arc<Q>,
    clock: Arc<C>,
    settings: ExecutionSettings,
}

impl<P, T, Q, C> PinScheduler<P, T, Q, C>
where
    P: PinRepository,
    T: TargetRepository,
    Q: PinQueue,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        pins: Arc<P>,
        targets: Arc<T>,
        queue: Arc<Q>,
        clock: Arc<C>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            pins: PinRegistryService::new(pins, targets, Arc::clone(&clock)),
            queue,
            clock,
            settings,
        }
    }

    /// Runs one scheduling pass.
    ///
    /// Every live pin scheduled before `now - refresh_interval` gets a new
    /// `scheduled_at` and one queued execution. A failure on one pin is
    /// recorded in the report and does not stop the pass.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Registry`] when the due pins cannot be
    /// listed.
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        let cutoff = window_start(self.clock.utc(), self.settings.refresh_window());
        let filter = PinFilter {
            scheduled_before: Some(cutoff),
            ..PinFilter::default()
        };
        let due = self.pins.list(&filter).await?;
        debug!(due = due.len(), %cutoff, "scheduler pass");

        let mut report = TickReport::default();
        for pin in due {
            let pin_id = pin.id();
            match self.schedule(pin).await {
                Ok(()) => report.enqueued.push(pin_id),
                Err(err) => {
                    warn!(pin_id = %pin_id, error = %err, "failed to schedule pin");
                    report.failures.push((pin_id, err));
                }
            }
        }
        if !report.is_empty() {
            info!(
                enqueued = report.enqueued.len(),
                failed = report.failures.len(),
                "scheduled pins"
            );
        }
        Ok(report)
    }

    async fn schedule(&self, pin: Pin) -> Result<(), SchedulerError> {
        let rescheduled = self.pins.reschedule(pin).await?;
        self.queue.enqueue(rescheduled.id()).await?;
        Ok(())
    }

    /// Ticks every `tick_interval` until `shutdown` turns `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick_interval = ?self.settings.tick_interval, "pin scheduler started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "scheduler pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("pin scheduler stopped");
                        break;
                    }
                }
            }
        }
    }
}
