//! Long-running services of the execution engine.

mod scheduler;
mod worker;

pub use scheduler::{PinScheduler, SchedulerError, TickReport};
pub use worker::{Claim, ExecutionReport, PinExecutionError, PinExecutionResult, PinWorker};
