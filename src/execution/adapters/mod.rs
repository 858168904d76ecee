//! Adapter implementations for execution ports.

pub mod memory;
pub mod postgres;
