//! Tunables shared by the scheduler and the worker.

use chrono::TimeDelta;
use std::time::Duration;

/// Per-execution bounds handed to a [`QueryRunner`](crate::execution::ports::QueryRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Maximum time to establish a connection to the target.
    pub connect_timeout: Duration,
    /// Server-side statement timeout.
    pub statement_timeout: Duration,
    /// Largest accepted result set; one more row fails the execution.
    pub max_rows: usize,
}

/// Execution engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Minimum time between automatic executions of one pin.
    pub refresh_interval: Duration,
    /// Bounds applied to each query.
    pub limits: QueryLimits,
    /// Age after which a reservation is treated as abandoned.
    pub reservation_timeout: Duration,
    /// Scheduler cadence.
    pub tick_interval: Duration,
    /// Number of independent single-pin loops per worker process.
    pub worker_concurrency: usize,
    /// How long an idle worker loop waits on the queue before polling for
    /// claimable pins.
    pub idle_poll: Duration,
    /// Number of candidates fetched per claim attempt.
    pub claim_batch: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(20 * 60),
            limits: QueryLimits {
                connect_timeout: Duration::from_secs(5),
                statement_timeout: Duration::from_secs(30),
                max_rows: 10_000,
            },
            reservation_timeout: Duration::from_secs(5 * 60),
            tick_interval: Duration::from_secs(10),
            worker_concurrency: 1,
            idle_poll: Duration::from_millis(250),
            claim_batch: 8,
        }
    }
}

impl ExecutionSettings {
    /// Returns the refresh interval as a signed calendar duration.
    #[must_use]
    pub fn refresh_window(&self) -> TimeDelta {
        to_time_delta(self.refresh_interval)
    }

    /// Returns the reservation liveness timeout as a signed calendar duration.
    #[must_use]
    pub fn reservation_window(&self) -> TimeDelta {
        to_time_delta(self.reservation_timeout)
    }
}

fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
