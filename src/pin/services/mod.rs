//! Application services for the pin registry.

mod registry;

pub use registry::{CreatePinRequest, PinRegistryError, PinRegistryResult, PinRegistryService};
