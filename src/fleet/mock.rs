//! Scripted fleet backend used by unit tests

use super::traits::{
    CommandInvocation, DocumentDescription, DocumentInfo, ExecutionHandle, FleetBackend,
    FleetError, FleetResult, InstanceInfo, SubmitCommand,
};
use async_trait::async_trait;
use rcworker_shared::ExecutionStatus;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every call and answers from canned responses.
///
/// A `None` response makes the corresponding call fail with
/// `FleetError::Unavailable`.
pub struct ScriptedFleet {
    pub document_status: Option<u16>,
    pub document_platforms: Option<Vec<String>>,
    pub instances: Option<Vec<InstanceInfo>>,
    pub submit_fails: bool,
    /// Status answers in poll order; `Err` entries are transient failures.
    /// Once exhausted every poll answers `Success`.
    statuses: Mutex<VecDeque<Result<ExecutionStatus, String>>>,
    calls: Mutex<Vec<&'static str>>,
    submissions: Mutex<Vec<SubmitCommand>>,
    status_queries: Mutex<Vec<String>>,
}

impl ScriptedFleet {
    /// A backend that knows one document and the given instances
    pub fn new(platforms: &[&str], instances: &[(&str, &str)]) -> Self {
        Self {
            document_status: Some(200),
            document_platforms: Some(platforms.iter().map(|p| p.to_string()).collect()),
            instances: Some(
                instances
                    .iter()
                    .map(|(id, platform)| InstanceInfo {
                        instance_id: id.to_string(),
                        platform_type: platform.to_string(),
                    })
                    .collect(),
            ),
            submit_fails: false,
            statuses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            status_queries: Mutex::new(Vec::new()),
        }
    }

    /// Queue status answers for subsequent polls
    pub fn script_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<ExecutionStatus, String>>,
    ) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<SubmitCommand> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn status_queries(&self) -> Vec<String> {
        self.status_queries.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unavailable<T>(call: &str) -> FleetResult<T> {
    Err(FleetError::Unavailable(format!("{} scripted to fail", call)))
}

#[async_trait]
impl FleetBackend for ScriptedFleet {
    async fn get_document(&self, name: &str) -> FleetResult<DocumentInfo> {
        self.record("get_document");
        match self.document_status {
            Some(status_code) => Ok(DocumentInfo {
                name: name.to_string(),
                status_code,
            }),
            None => unavailable("get_document"),
        }
    }

    async fn describe_document(&self, name: &str) -> FleetResult<DocumentDescription> {
        self.record("describe_document");
        match &self.document_platforms {
            Some(platforms) => Ok(DocumentDescription {
                name: name.to_string(),
                platform_types: platforms.clone(),
            }),
            None => unavailable("describe_document"),
        }
    }

    /// One entry per requested id the script knows, in request order
    async fn describe_instances(&self, instance_ids: &[String]) -> FleetResult<Vec<InstanceInfo>> {
        self.record("describe_instances");
        match &self.instances {
            Some(instances) => Ok(instance_ids
                .iter()
                .filter_map(|id| instances.iter().find(|i| &i.instance_id == id).cloned())
                .collect()),
            None => unavailable("describe_instances"),
        }
    }

    async fn submit_command(&self, command: SubmitCommand) -> FleetResult<ExecutionHandle> {
        self.record("submit_command");
        if self.submit_fails {
            return Err(FleetError::Rejected("submission scripted to fail".into()));
        }
        self.submissions.lock().unwrap().push(command);
        Ok(ExecutionHandle("cmd-test".into()))
    }

    async fn get_command_status(
        &self,
        instance_id: &str,
        handle: &ExecutionHandle,
    ) -> FleetResult<CommandInvocation> {
        self.record("get_command_status");
        self.status_queries
            .lock()
            .unwrap()
            .push(instance_id.to_string());

        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ExecutionStatus::Success));

        match next {
            Ok(status) => Ok(CommandInvocation {
                instance_id: instance_id.to_string(),
                handle: handle.clone(),
                status,
                response_code: if status.is_terminal() { 0 } else { -1 },
                start_time: None,
                end_time: None,
                status_details: status.to_string(),
                output: String::new(),
            }),
            Err(reason) => Err(FleetError::Unavailable(reason)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
