//! Port contracts used by the scheduler and the worker.

pub mod queue;
pub mod runner;

pub use queue::{PinQueue, PinQueueError, PinQueueResult};
pub use runner::QueryRunner;
