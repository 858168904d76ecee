//! Application services for the target registry.

mod registry;

pub use registry::{
    CreateTargetRequest, TargetRegistryError, TargetRegistryResult, TargetRegistryService,
};
