//! Run-command worker shared types
//!
//! This crate provides the message model and wire codec shared between the
//! worker and the tools that publish work to it.

pub mod codec;
pub mod status;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use status::ExecutionStatus;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Worker timing and routing parameters
pub mod worker {
    /// Interval between status polls for a non-terminal invocation
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Delay between submission and the first status poll
    pub const GRACE_DELAY_MS: u64 = 2000;

    /// Exchange both receivers bind to
    pub const EXCHANGE: &str = "runcommand_exchange";

    /// Queue and routing key for run-command requests
    pub const RUN_COMMAND_QUEUE: &str = "runcommand_queue";
    pub const RUN_COMMAND_ROUTING_KEY: &str = "runcommand";

    /// Queue and routing key for echo commands
    pub const ECHO_QUEUE: &str = "echo_queue";
    pub const ECHO_ROUTING_KEY: &str = "echo";

    /// Default address the worker accepts publisher connections on
    pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5670";
}

/// A request to run a command document on a set of instances
///
/// Every field defaults when missing from the payload, so an incomplete
/// message still deserializes and is rejected by validation instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandRequest {
    pub instance_ids: Vec<String>,
    pub document: Option<String>,
    pub parameters: BTreeMap<String, Vec<String>>,
    pub target_platform: Option<String>,
}

impl CommandRequest {
    /// Document name, if present and non-empty
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref().filter(|d| !d.is_empty())
    }

    /// Declared target platform, if present and non-empty
    pub fn target_platform(&self) -> Option<&str> {
        self.target_platform.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "InstanceIds: {}", self.instance_ids.join("|"))?;
        writeln!(f, "Document: {}", self.document.as_deref().unwrap_or_default())?;

        let params = self
            .parameters
            .iter()
            .map(|(name, values)| format!("{} - {}", name, values.join("|")))
            .collect::<Vec<_>>()
            .join("|");
        writeln!(f, "Parameters: {}", params)?;

        write!(
            f,
            "TargetPlatform: {}",
            self.target_platform.as_deref().unwrap_or_default()
        )
    }
}

/// A named command with free-form arguments, consumed by the echo receiver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoCommand {
    pub name: String,
    pub args: String,
}

impl fmt::Display for EchoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.args)
    }
}
