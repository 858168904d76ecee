//! Unit tests for the pin registry.
