//! Simulated fleet backend for development and local runs
//!
//! Documents and instances come from a seed (built in or loaded from a JSON
//! file). Every submitted invocation reports `Pending` on its first poll,
//! `InProgress` until `steps_to_complete` polls have been made, then `Success`.
//! Finished invocations stay queryable for a retention window and are pruned
//! on the next submission after it has passed.

use super::traits::{
    CommandInvocation, DocumentDescription, DocumentInfo, ExecutionHandle, FleetBackend,
    FleetError, FleetResult, InstanceInfo, SubmitCommand,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rcworker_shared::{now_ms, ExecutionStatus};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// How long a finished invocation stays queryable by default
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

/// Documents (name -> supported platforms) and instances (id -> platform)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FleetSeed {
    pub documents: BTreeMap<String, Vec<String>>,
    pub instances: BTreeMap<String, String>,
}

impl FleetSeed {
    /// A small fleet with one Linux and one Windows instance
    pub fn sample() -> Self {
        let mut documents = BTreeMap::new();
        documents.insert(
            "RunShellScript".to_string(),
            vec!["Linux".to_string(), "MacOS".to_string()],
        );
        documents.insert(
            "RunPowerShellScript".to_string(),
            vec!["Windows".to_string(), "Linux".to_string()],
        );

        let mut instances = BTreeMap::new();
        instances.insert("i-0a1b2c3d".to_string(), "Linux".to_string());
        instances.insert("i-0e4f5a6b".to_string(), "Windows".to_string());

        Self {
            documents,
            instances,
        }
    }

    /// Load a seed from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet seed {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing fleet seed {}", path.display()))
    }
}

#[derive(Debug)]
struct SimulatedInvocation {
    document: String,
    parameters: BTreeMap<String, Vec<String>>,
    submitted_at: u64,
    /// Set by the first poll that reports a terminal status
    completed_at: Option<u64>,
    polls: u32,
}

/// In-process fleet backend
pub struct SimulatedFleet {
    seed: FleetSeed,
    steps_to_complete: u32,
    retention: Duration,
    next_handle: AtomicU64,
    /// Invocations by (handle, instance_id)
    invocations: RwLock<HashMap<(ExecutionHandle, String), SimulatedInvocation>>,
}

impl SimulatedFleet {
    /// Create a simulated fleet from a seed
    pub fn new(seed: FleetSeed, steps_to_complete: u32) -> Self {
        Self {
            seed,
            steps_to_complete,
            retention: DEFAULT_RETENTION,
            next_handle: AtomicU64::new(0),
            invocations: RwLock::new(HashMap::new()),
        }
    }

    /// Keep finished invocations queryable for `retention`
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn next_handle(&self) -> ExecutionHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        ExecutionHandle(format!("cmd-{:08}", id))
    }

    fn status_for_poll(&self, poll: u32) -> ExecutionStatus {
        if poll > self.steps_to_complete {
            ExecutionStatus::Success
        } else if poll == 1 {
            ExecutionStatus::Pending
        } else {
            ExecutionStatus::InProgress
        }
    }

    /// Drop invocations that finished more than `retention` ago
    fn prune_finished(
        &self,
        invocations: &mut HashMap<(ExecutionHandle, String), SimulatedInvocation>,
        now: u64,
    ) {
        let retention_ms = u64::try_from(self.retention.as_millis()).unwrap_or(u64::MAX);
        let before = invocations.len();
        invocations.retain(|_, invocation| match invocation.completed_at {
            Some(completed_at) => now.saturating_sub(completed_at) < retention_ms,
            None => true,
        });

        let pruned = before - invocations.len();
        if pruned > 0 {
            debug!("[FLEET] Pruned {} finished invocation(s)", pruned);
        }
    }
}

#[async_trait]
impl FleetBackend for SimulatedFleet {
    async fn get_document(&self, name: &str) -> FleetResult<DocumentInfo> {
        if self.seed.documents.contains_key(name) {
            Ok(DocumentInfo {
                name: name.to_string(),
                status_code: 200,
            })
        } else {
            Err(FleetError::DocumentNotFound(name.to_string()))
        }
    }

    async fn describe_document(&self, name: &str) -> FleetResult<DocumentDescription> {
        let platforms = self
            .seed
            .documents
            .get(name)
            .ok_or_else(|| FleetError::DocumentNotFound(name.to_string()))?;

        Ok(DocumentDescription {
            name: name.to_string(),
            platform_types: platforms.clone(),
        })
    }

    async fn describe_instances(&self, instance_ids: &[String]) -> FleetResult<Vec<InstanceInfo>> {
        // Unknown ids are left out of the result, as a filter would do
        Ok(instance_ids
            .iter()
            .filter_map(|id| {
                self.seed.instances.get(id).map(|platform| InstanceInfo {
                    instance_id: id.clone(),
                    platform_type: platform.clone(),
                })
            })
            .collect())
    }

    async fn submit_command(&self, command: SubmitCommand) -> FleetResult<ExecutionHandle> {
        if !self.seed.documents.contains_key(&command.document) {
            return Err(FleetError::DocumentNotFound(command.document));
        }
        if command.instance_ids.is_empty() {
            return Err(FleetError::Rejected("no target instances".into()));
        }
        if let Some(unknown) = command
            .instance_ids
            .iter()
            .find(|id| !self.seed.instances.contains_key(*id))
        {
            return Err(FleetError::InstanceNotFound(unknown.clone()));
        }

        let handle = self.next_handle();
        let submitted_at = now_ms();

        let mut invocations = self.invocations.write().await;
        self.prune_finished(&mut invocations, submitted_at);
        for instance_id in &command.instance_ids {
            invocations
                .entry((handle.clone(), instance_id.clone()))
                .or_insert_with(|| SimulatedInvocation {
                    document: command.document.clone(),
                    parameters: command.parameters.clone(),
                    submitted_at,
                    completed_at: None,
                    polls: 0,
                });
        }

        debug!(
            "[FLEET] Accepted {} for {} instance(s) as {}",
            command.document,
            command.instance_ids.len(),
            handle
        );

        Ok(handle)
    }

    async fn get_command_status(
        &self,
        instance_id: &str,
        handle: &ExecutionHandle,
    ) -> FleetResult<CommandInvocation> {
        let mut invocations = self.invocations.write().await;
        let invocation = invocations
            .get_mut(&(handle.clone(), instance_id.to_string()))
            .ok_or_else(|| FleetError::InvocationNotFound {
                handle: handle.clone(),
                instance_id: instance_id.to_string(),
            })?;

        invocation.polls += 1;
        let status = self.status_for_poll(invocation.polls);

        let (response_code, end_time, output) = if status.is_terminal() {
            let end_time = *invocation.completed_at.get_or_insert_with(now_ms);
            let commands = invocation
                .parameters
                .get("commands")
                .map(|c| c.join("; "))
                .unwrap_or_default();
            (
                0,
                Some(end_time),
                format!("{} on {}: {}", invocation.document, instance_id, commands),
            )
        } else {
            (-1, None, String::new())
        };

        Ok(CommandInvocation {
            instance_id: instance_id.to_string(),
            handle: handle.clone(),
            status,
            response_code,
            start_time: Some(invocation.submitted_at),
            end_time,
            status_details: status.to_string(),
            output,
        })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
