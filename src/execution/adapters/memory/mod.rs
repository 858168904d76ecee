//! In-process adapters for the execution ports.

mod queue;
mod runner;

pub use queue::InMemoryPinQueue;
pub use runner::{ScriptedQueryRunner, ScriptedResponse};
