//! Pin registry.
//!
//! Pins are named queries bound to a target. Besides the query definition a
//! pin stores the outcome of its latest execution and the scheduling and
//! reservation timestamps the execution engine coordinates through. Every
//! write is a version-checked update.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
