//! Adapter implementations for target registry ports.

pub mod cipher;
pub mod memory;
pub mod postgres;

pub use cipher::AesGcmUrlCipher;
