//! Query executor: claims due pins, runs them, and commits their outcome.
//!
//! One execution is strictly sequential: resolve the target, mark the pin
//! started, run the query, classify the outcome, commit it, and release the
//! reservation. Every write is a version-checked update through
//! [`PinRegistryService`], so concurrent workers never overwrite each other.

use crate::execution::domain::{ExecutionSettings, QueryRunError, classify};
use crate::execution::ports::{PinQueue, PinQueueError, PinQueueResult, QueryRunner};
use crate::pin::{
    domain::{ClaimCutoffs, Pin, PinId},
    ports::PinRepository,
    services::{PinRegistryError, PinRegistryService},
};
use crate::target::{
    domain::TargetId,
    ports::{TargetRepository, TargetRepositoryError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Errors that abort one execution without recording anything on the pin.
#[derive(Debug, Error)]
pub enum PinExecutionError {
    /// The pin's target is absent or deleted.
    #[error("pin {pin_id} references unavailable target {target_id}")]
    TargetUnavailable {
        /// Pin being executed.
        pin_id: PinId,
        /// Missing target.
        target_id: TargetId,
    },

    /// The target could not be read or its URL could not be opened.
    #[error(transparent)]
    TargetLookup(#[from] TargetRepositoryError),

    /// The query runner failed internally.
    #[error(transparent)]
    Runner(#[from] QueryRunError),

    /// The pin changed between being marked started and the commit; the
    /// result was discarded.
    #[error("pin {pin_id} was modified during execution; result discarded")]
    CommitConflict {
        /// Pin being executed.
        pin_id: PinId,
    },

    /// A pin registry write or read failed.
    #[error(transparent)]
    Registry(#[from] PinRegistryError),

    /// The queue failed.
    #[error(transparent)]
    Queue(#[from] PinQueueError),
}

/// Result type for worker operations.
pub type PinExecutionResult<T> = Result<T, PinExecutionError>;

/// A reservation held by this worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pin: Pin,
    token: DateTime<Utc>,
}

impl Claim {
    /// Returns the reserved pin.
    #[must_use]
    pub const fn pin(&self) -> &Pin {
        &self.pin
    }

    /// Returns the reservation marker written for this claim.
    #[must_use]
    pub const fn token(&self) -> DateTime<Utc> {
        self.token
    }
}

/// How a claimed execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    /// The outcome was committed; the pin is the stored revision before the
    /// reservation was released.
    Committed(Pin),
    /// Another writer changed the pin before it could be marked started.
    /// Nothing ran; the pin becomes claimable again on a later pass.
    Abandoned(PinId),
}

/// Executes pins claimed through the row reservation.
pub struct PinWorker<P, T, R, Q, C>
where
    P: PinRepository,
    T: TargetRepository,
    R: QueryRunner,
    Q: PinQueue,
    C: Clock + Send + Sync,
{
    pins: PinRegistryService<P, T, C>,
    targets: Arc<T>,
    runner: Arc<R>,
    queue: Arc<Q>,
    clock: Arc<C>,
    settings: ExecutionSettings,
}

impl<P, T, R, Q, C> PinWorker<P, T, R, Q, C>
where
    P: PinRepository,
    T: TargetRepository,
    R: QueryRunner,
    Q: PinQueue,
    C: Clock + Send + Sync,
{
    /// Creates a worker.
    #[must_use]
    pub fn new(
        pins: Arc<P>,
        targets: Arc<T>,
        runner: Arc<R>,
        queue: Arc<Q>,
        clock: Arc<C>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            pins: PinRegistryService::new(pins, Arc::clone(&targets), Arc::clone(&clock)),
            targets,
            runner,
            queue,
            clock,
            settings,
        }
    }

    fn cutoffs(&self) -> ClaimCutoffs {
        ClaimCutoffs::at(
            self.clock.utc(),
            self.settings.refresh_window(),
            self.settings.reservation_window(),
        )
    }

    /// Reserves the least recently scheduled claimable pin.
    ///
    /// Candidates whose reservation races with another worker are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PinExecutionError::Registry`] when storage fails.
    pub async fn claim_next(&self) -> PinExecutionResult<Option<Claim>> {
        let candidates = self
            .pins
            .claim_candidates(self.cutoffs(), self.settings.claim_batch)
            .await?;
        for candidate in candidates {
            if let Some(claim) = self.try_reserve(candidate).await? {
                return Ok(Some(claim));
            }
        }
        Ok(None)
    }

    /// Reserves a specific pin if it is currently claimable.
    ///
    /// # Errors
    ///
    /// Returns [`PinExecutionError::Registry`] when storage fails.
    pub async fn claim(&self, pin_id: PinId) -> PinExecutionResult<Option<Claim>> {
        let pin = match self.pins.get_live(pin_id).await {
            Ok(found) => found,
            Err(PinRegistryError::NotFound(_)) => {
                debug!(pin_id = %pin_id, "delivered pin no longer exists");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        if !pin.is_claimable(self.cutoffs()) {
            debug!(pin_id = %pin_id, "delivered pin is not claimable");
            return Ok(None);
        }
        self.try_reserve(pin).await
    }

    async fn try_reserve(&self, pin: Pin) -> PinExecutionResult<Option<Claim>> {
        let pin_id = pin.id();
        match self.pins.reserve(pin).await {
            Ok((reserved, token)) => {
                debug!(pin_id = %pin_id, "claimed pin");
                Ok(Some(Claim {
                    pin: reserved,
                    token,
                }))
            }
            Err(PinRegistryError::ConcurrentUpdate { .. } | PinRegistryError::NotFound(_)) => {
                debug!(pin_id = %pin_id, "lost claim race");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Handles one queue delivery: claims the pin and executes it.
    ///
    /// Returns `None` when the pin could not be claimed.
    ///
    /// # Errors
    ///
    /// Returns [`PinExecutionError`] when the execution aborts.
    pub async fn on_message(&self, pin_id: PinId) -> PinExecutionResult<Option<ExecutionReport>> {
        match self.claim(pin_id).await? {
            Some(claim) => self.execute(claim).await.map(Some),
            None => Ok(None),
        }
    }

    /// Claims and executes the next claimable pin, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PinExecutionError`] when claiming or executing fails.
    pub async fn run_once(&self) -> PinExecutionResult<Option<ExecutionReport>> {
        match self.claim_next().await? {
            Some(claim) => self.execute(claim).await.map(Some),
            None => Ok(None),
        }
    }

    /// Executes a claimed pin and releases the reservation.
    ///
    /// The release runs whatever the execution outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PinExecutionError`] when the execution aborts, or when only
    /// the release fails.
    pub async fn execute(&self, claim: Claim) -> PinExecutionResult<ExecutionReport> {
        let Claim { pin, token } = claim;
        let pin_id = pin.id();
        let outcome = self.execute_claimed(pin).await;

        match self.pins.release(pin_id, token).await {
            Ok(()) => debug!(pin_id = %pin_id, "released pin"),
            Err(err) => {
                error!(pin_id = %pin_id, error = %err, "failed to release pin reservation");
                if outcome.is_ok() {
                    return Err(err.into());
                }
            }
        }
        outcome
    }

    async fn execute_claimed(&self, pin: Pin) -> PinExecutionResult<ExecutionReport> {
        let pin_id = pin.id();
        let target_id = pin.target_id();
        let target = self
            .targets
            .find_by_id(target_id)
            .await?
            .filter(|found| !found.is_deleted())
            .ok_or(PinExecutionError::TargetUnavailable { pin_id, target_id })?;

        let started = match self.pins.mark_started(pin).await {
            Ok(started) => started,
            Err(PinRegistryError::ConcurrentUpdate { .. }) => {
                info!(pin_id = %pin_id, "pin changed before start; abandoning attempt");
                return Ok(ExecutionReport::Abandoned(pin_id));
            }
            Err(err) => return Err(err.into()),
        };
        debug!(pin_id = %pin_id, target_id = %target_id, "running pin query");

        let ran = self
            .runner
            .run(target.url(), started.query(), self.settings.limits)
            .await;
        if let Err(err) = &ran {
            debug!(pin_id = %pin_id, error = %err, "pin query failed");
        }
        let results = classify(ran)?;

        match self.pins.record_results(started, results).await {
            Ok(committed) => {
                info!(
                    pin_id = %pin_id,
                    failed = committed.results().and_then(|results| results.error_message()).is_some(),
                    "committed pin results"
                );
                Ok(ExecutionReport::Committed(committed))
            }
            Err(PinRegistryError::ConcurrentUpdate { .. }) => {
                warn!(pin_id = %pin_id, "pin modified during execution; discarding result");
                Err(PinExecutionError::CommitConflict { pin_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn handle_delivery(
        &self,
        delivery: PinQueueResult<Option<PinId>>,
    ) -> PinExecutionResult<Option<ExecutionReport>> {
        match delivery {
            Ok(Some(pin_id)) => self.on_message(pin_id).await,
            Ok(None) => self.run_once().await,
            Err(err) => {
                warn!(error = %err, "pin queue unavailable; polling for claimable pins");
                self.run_once().await
            }
        }
    }

    async fn run_loop(&self, loop_index: usize, mut shutdown: watch::Receiver<bool>) {
        debug!(loop_index, "worker loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            // Only the wait is raced against shutdown; an execution runs to
            // completion once started.
            let delivery = tokio::select! {
                delivery = self.queue.dequeue(self.settings.idle_poll) => delivery,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            if let Err(err) = self.handle_delivery(delivery).await {
                error!(loop_index, error = %err, "pin execution aborted");
            }
        }
        debug!(loop_index, "worker loop stopped");
    }
}

impl<P, T, R, Q, C> PinWorker<P, T, R, Q, C>
where
    P: PinRepository + 'static,
    T: TargetRepository + 'static,
    R: QueryRunner + 'static,
    Q: PinQueue + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Runs the configured number of single-pin loops until `shutdown` turns
    /// `true`.
    ///
    /// A loop finishes the pin it is executing before it stops.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let concurrency = self.settings.worker_concurrency.max(1);
        info!(concurrency, "pin worker started");
        let mut loops = JoinSet::new();
        for loop_index in 0..concurrency {
            let worker = Arc::clone(&self);
            let loop_shutdown = shutdown.clone();
            loops.spawn(async move { worker.run_loop(loop_index, loop_shutdown).await });
        }
        while let Some(joined) = loops.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "worker loop panicked");
            }
        }
        info!("pin worker stopped");
    }
}
