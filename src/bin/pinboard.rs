//! Pinboard process entry point.
//!
//! Usage:
//!
//! ```text
//! pinboard [--config <path>] migrate
//! pinboard [--config <path>] scheduler
//! pinboard [--config <path>] worker
//! ```
//!
//! `migrate` applies the embedded registry schema. `scheduler` queues due
//! pins on a fixed cadence and `worker` executes them; both run until
//! interrupted and finish their current step before exiting. Settings are
//! read from the optional TOML file and `PINBOARD_*` environment variables.

use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use pinboard::config::{ConfigError, PinboardConfig};
use pinboard::execution::adapters::postgres::{PostgresPinQueue, PostgresQueryRunner};
use pinboard::execution::services::{PinScheduler, PinWorker};
use pinboard::pin::adapters::postgres::PostgresPinRepository;
use pinboard::target::adapters::AesGcmUrlCipher;
use pinboard::target::adapters::postgres::PostgresTargetRepository;
use pinboard::target::ports::{CipherError, UrlCipher};
use pinboard::{schema, store, telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tracing::{error, info};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that stop the process.
#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("registry database unavailable: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("migration failed: {0}")]
    Migration(#[from] diesel::result::Error),
    #[error("invalid encryption keys: {0}")]
    Cipher(#[from] CipherError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "pinboard", about = "Scheduled execution of pinned SQL queries")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Apply pending registry migrations.
    Migrate,
    /// Queue pins whose refresh interval has elapsed.
    Scheduler,
    /// Execute queued and claimable pins.
    Worker,
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    telemetry::init();
    run(&cli).map_err(|err| {
        error!(error = %err, "pinboard exited with an error");
        err.into()
    })
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = PinboardConfig::load(cli.config.as_deref())?;
    let pool = store::connect(&config.database)?;

    match cli.command {
        Command::Migrate => {
            let mut connection = pool.get()?;
            let applied = schema::apply(&mut connection)?;
            info!(applied = applied.len(), "registry schema is up to date");
            Ok(())
        }
        Command::Scheduler => {
            let runtime = build_runtime()?;
            let clock = Arc::new(DefaultClock);
            let targets = Arc::new(PostgresTargetRepository::new(
                pool.clone(),
                build_cipher(&config, Arc::clone(&clock))?,
            ));
            let scheduler = PinScheduler::new(
                Arc::new(PostgresPinRepository::new(pool.clone())),
                targets,
                Arc::new(PostgresPinQueue::new(pool)),
                clock,
                config.execution_settings(),
            );
            runtime.block_on(async {
                scheduler.run(shutdown_signal()).await;
            });
            Ok(())
        }
        Command::Worker => {
            let runtime = build_runtime()?;
            let clock = Arc::new(DefaultClock);
            let targets = Arc::new(PostgresTargetRepository::new(
                pool.clone(),
                build_cipher(&config, Arc::clone(&clock))?,
            ));
            let worker = Arc::new(PinWorker::new(
                Arc::new(PostgresPinRepository::new(pool.clone())),
                targets,
                Arc::new(PostgresQueryRunner::new()),
                Arc::new(PostgresPinQueue::new(pool)),
                clock,
                config.execution_settings(),
            ));
            runtime.block_on(async {
                worker.run(shutdown_signal()).await;
            });
            Ok(())
        }
    }
}

fn build_cipher(
    config: &PinboardConfig,
    clock: Arc<DefaultClock>,
) -> Result<Arc<dyn UrlCipher>, AppError> {
    let cipher =
        AesGcmUrlCipher::from_base64_keys(&config.encryption.keys, config.encryption_ttl(), clock)?;
    Ok(Arc::new(cipher))
}

fn build_runtime() -> Result<tokio::runtime::Runtime, AppError> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::RuntimeInit)
}

/// Returns a receiver that flips to `true` on the first interrupt.
///
/// Must be called inside the runtime.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received; finishing current work"),
            Err(err) => error!(error = %err, "failed to listen for interrupt; stopping"),
        }
        if sender.send(true).is_err() {
            info!("service already stopped");
        }
    });
    receiver
}
