//! Command execution status
//!
//! Status values reported by the fleet backend for one instance of a
//! submitted command. Only `Pending` and `InProgress` keep a poll loop alive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-instance execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Accepted but not yet picked up by the instance agent
    Pending,
    /// Running on the instance
    InProgress,
    /// Delivery delayed by the backend
    Delayed,
    /// Finished successfully
    Success,
    /// Cancelled before completion
    Cancelled,
    /// Exceeded the execution timeout
    TimedOut,
    /// Finished with a failure
    Failed,
    /// Cancellation requested
    Cancelling,
}

impl ExecutionStatus {
    /// Whether the poll loop should stop on this status
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::InProgress)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::InProgress => "InProgress",
            ExecutionStatus::Delayed => "Delayed",
            ExecutionStatus::Success => "Success",
            ExecutionStatus::Cancelled => "Cancelled",
            ExecutionStatus::TimedOut => "TimedOut",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Cancelling => "Cancelling",
        };
        f.write_str(name)
    }
}
