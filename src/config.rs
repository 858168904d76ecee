//! Layered process configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `PINBOARD_`-prefixed environment variables using `__` as the nesting
//! separator (for example `PINBOARD_PINS__REFRESH_INTERVAL_SECS=60`).

use crate::execution::domain::{ExecutionSettings, QueryLimits};
use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "PINBOARD_";
const TEN_YEARS_SECS: u64 = 10 * 365 * 24 * 60 * 60;
const DEFAULT_CLAIM_BATCH: usize = 8;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed or a value had the wrong shape.
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    /// A value was well-formed but unusable.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Registry database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL of the registry database.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Time allowed to obtain a connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Statement timeout applied to registry sessions, in milliseconds.
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/pinboard".to_owned(),
            pool_size: 5,
            connect_timeout_ms: 5_000,
            statement_timeout_ms: 5_000,
        }
    }
}

/// Pin execution bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinsConfig {
    /// Minimum seconds between automatic executions of one pin.
    pub refresh_interval_secs: u64,
    /// Statement timeout on target databases, in milliseconds.
    pub statement_timeout_ms: u64,
    /// Connect timeout for target databases, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest result set stored for a pin.
    pub results_rows_max: usize,
    /// Seconds after which a reservation counts as abandoned.
    pub reservation_timeout_secs: u64,
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 20 * 60,
            statement_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            results_rows_max: 10_000,
            reservation_timeout_secs: 5 * 60,
        }
    }
}

/// Scheduler cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds between scheduler passes.
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10_000,
        }
    }
}

/// Worker process settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of single-pin loops.
    pub concurrency: usize,
    /// Milliseconds an idle loop waits on the queue before polling.
    pub idle_poll_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            idle_poll_ms: 250,
        }
    }
}

/// Connection URL encryption keys.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte keys; the first one seals new values.
    pub keys: Vec<String>,
    /// Maximum age of a sealed value, in seconds.
    pub ttl_secs: u64,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            ttl_secs: TEN_YEARS_SECS,
        }
    }
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinboardConfig {
    /// Registry database.
    pub database: DatabaseConfig,
    /// Pin execution bounds.
    pub pins: PinsConfig,
    /// Scheduler cadence.
    pub scheduler: SchedulerConfig,
    /// Worker settings.
    pub worker: WorkerConfig,
    /// URL encryption.
    pub encryption: EncryptionConfig,
}

impl PinboardConfig {
    /// Loads configuration from `path` (when given) and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a provider fails or validation rejects
    /// the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(file) = path {
            figment = figment.merge(Toml::file(file));
        }
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extracts and validates configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    ///
    /// The reservation timeout must exceed the longest possible execution,
    /// otherwise a running pin could be claimed a second time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.results_rows_max == 0 {
            return Err(ConfigError::Invalid {
                field: "pins.results_rows_max",
                reason: "must be positive",
            });
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "worker.concurrency",
                reason: "must be positive",
            });
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.tick_interval_ms",
                reason: "must be positive",
            });
        }
        if self.encryption.keys.is_empty() {
            return Err(ConfigError::Invalid {
                field: "encryption.keys",
                reason: "at least one key is required",
            });
        }
        let longest_execution = Duration::from_millis(self.pins.connect_timeout_ms)
            .saturating_add(Duration::from_millis(self.pins.statement_timeout_ms));
        if Duration::from_secs(self.pins.reservation_timeout_secs) <= longest_execution {
            return Err(ConfigError::Invalid {
                field: "pins.reservation_timeout_secs",
                reason: "must exceed the pin connect and statement timeouts combined",
            });
        }
        Ok(())
    }

    /// Projects the scheduler and worker knobs into engine settings.
    #[must_use]
    pub const fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            refresh_interval: Duration::from_secs(self.pins.refresh_interval_secs),
            limits: QueryLimits {
                connect_timeout: Duration::from_millis(self.pins.connect_timeout_ms),
                statement_timeout: Duration::from_millis(self.pins.statement_timeout_ms),
                max_rows: self.pins.results_rows_max,
            },
            reservation_timeout: Duration::from_secs(self.pins.reservation_timeout_secs),
            tick_interval: Duration::from_millis(self.scheduler.tick_interval_ms),
            worker_concurrency: self.worker.concurrency,
            idle_poll: Duration::from_millis(self.worker.idle_poll_ms),
            claim_batch: DEFAULT_CLAIM_BATCH,
        }
    }

    /// Returns the sealed-URL maximum age.
    #[must_use]
    pub fn encryption_ttl(&self) -> TimeDelta {
        TimeDelta::from_std(Duration::from_secs(self.encryption.ttl_secs)).unwrap_or(TimeDelta::MAX)
    }
}
