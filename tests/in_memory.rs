//! Integration tests wiring registries, scheduler, and worker over the
//! in-memory adapters.

mod test_helpers;

mod in_memory {
    mod execution_tests;
    mod registry_tests;
}
