//! Adapter implementations for pin registry ports.

pub mod memory;
pub mod postgres;
