//! Unit tests for the execution engine.
