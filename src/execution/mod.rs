//! Pin execution engine.
//!
//! The [`PinScheduler`](services::PinScheduler) queues pins whose refresh
//! interval has elapsed. Each [`PinWorker`](services::PinWorker) loop claims
//! one pin at a time through the row reservation, runs its query against the
//! target, and commits the classified outcome. Coordination between
//! processes happens only through version-checked pin writes, so the queue
//! is a wake-up channel rather than a source of truth.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
