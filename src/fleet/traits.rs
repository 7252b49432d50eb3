//! Fleet backend trait abstraction for pluggable command-execution services

use async_trait::async_trait;
use rcworker_shared::ExecutionStatus;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors reported by a fleet backend
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("No invocation {handle} for instance {instance_id}")]
    InvocationNotFound {
        handle: ExecutionHandle,
        instance_id: String,
    },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type FleetResult<T> = Result<T, FleetError>;

/// Response to a document lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    /// HTTP-style status code of the lookup
    pub status_code: u16,
}

impl DocumentInfo {
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

/// Document metadata, including the platforms it supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescription {
    pub name: String,
    pub platform_types: Vec<String>,
}

/// Platform metadata for one managed instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub platform_type: String,
}

/// Backend-issued identifier for a submitted command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionHandle(pub String);

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A command submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    pub document: String,
    pub instance_ids: Vec<String>,
    pub parameters: BTreeMap<String, Vec<String>>,
}

/// Status of a submitted command on one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub instance_id: String,
    pub handle: ExecutionHandle,
    pub status: ExecutionStatus,
    pub response_code: i32,
    /// Milliseconds since Unix epoch
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub status_details: String,
    pub output: String,
}

/// Capabilities the worker consumes from a fleet-management service
#[async_trait]
pub trait FleetBackend: Send + Sync {
    /// Look up a command document
    async fn get_document(&self, name: &str) -> FleetResult<DocumentInfo>;

    /// Describe a command document
    async fn describe_document(&self, name: &str) -> FleetResult<DocumentDescription>;

    /// Describe every listed instance in one batched call
    async fn describe_instances(&self, instance_ids: &[String]) -> FleetResult<Vec<InstanceInfo>>;

    /// Submit a command for execution
    async fn submit_command(&self, command: SubmitCommand) -> FleetResult<ExecutionHandle>;

    /// Get the execution status of a submitted command on one instance
    async fn get_command_status(
        &self,
        instance_id: &str,
        handle: &ExecutionHandle,
    ) -> FleetResult<CommandInvocation>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
