//! Unit tests for the target registry.

mod cipher_tests;
