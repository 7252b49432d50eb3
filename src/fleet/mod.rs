//! Fleet backend abstraction
//!
//! The worker talks to its command-execution service only through the
//! `FleetBackend` trait. A simulated implementation is provided for local runs.

#[cfg(test)]
pub mod mock;
pub mod simulated;
pub mod traits;

pub use simulated::{FleetSeed, SimulatedFleet, DEFAULT_RETENTION};
pub use traits::{
    CommandInvocation, DocumentDescription, DocumentInfo, ExecutionHandle, FleetBackend,
    FleetError, FleetResult, InstanceInfo, SubmitCommand,
};
