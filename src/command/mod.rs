//! Command validation and dispatch for the worker
//!
//! This module handles:
//! - Validating requests against the fleet's documents and instances
//! - Submitting validated requests for execution
//! - Polling each target instance until its invocation finishes

mod dispatcher;
mod validator;

pub use dispatcher::{DispatchOptions, DispatchOutcome, ExecutionDispatcher};
pub use validator::{CommandValidator, FleetValidator, ValidationOutcome};
