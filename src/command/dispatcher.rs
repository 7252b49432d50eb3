//! Execution dispatcher - submits validated commands and waits for completion

use super::validator::{CommandValidator, ValidationOutcome};
use crate::fleet::{CommandInvocation, ExecutionHandle, FleetBackend, SubmitCommand};
use anyhow::{Context, Result};
use rcworker_shared::{worker, CommandRequest};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Controls whether and how the dispatcher waits for completion
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Poll every instance until it reaches a terminal status
    pub wait_for_completion: bool,
    /// Delay between submission and the first poll
    pub grace_delay: Duration,
    /// Delay between polls of a non-terminal instance
    pub poll_interval: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            wait_for_completion: false,
            grace_delay: Duration::from_millis(worker::GRACE_DELAY_MS),
            poll_interval: Duration::from_millis(worker::POLL_INTERVAL_MS),
        }
    }
}

/// What happened to a dispatched request
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Validation failed, nothing was submitted
    Skipped(ValidationOutcome),
    /// Submitted; `invocations` holds final statuses when waiting is enabled
    Submitted {
        handle: ExecutionHandle,
        invocations: Vec<CommandInvocation>,
    },
}

/// Submits command requests to the fleet
pub struct ExecutionDispatcher {
    fleet: Arc<dyn FleetBackend>,
    validator: Arc<dyn CommandValidator>,
    options: DispatchOptions,
}

impl ExecutionDispatcher {
    /// Create a new execution dispatcher
    pub fn new(
        fleet: Arc<dyn FleetBackend>,
        validator: Arc<dyn CommandValidator>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            fleet,
            validator,
            options,
        }
    }

    /// Validate, submit and optionally wait for a command request
    ///
    /// A request that fails validation is dropped without error. A submission
    /// failure is returned to the caller.
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<DispatchOutcome> {
        let validation = self.validator.validate(request).await;
        if !validation.passed {
            info!("[DISPATCH] Request failed validation, not submitting");
            return Ok(DispatchOutcome::Skipped(validation));
        }

        let handle = self.submit(request).await?;

        let mut invocations = Vec::new();
        if self.options.wait_for_completion {
            sleep(self.options.grace_delay).await;

            // One instance at a time, in request order
            for instance_id in &request.instance_ids {
                invocations.push(self.poll_until_done(instance_id, &handle).await);
            }
        }

        Ok(DispatchOutcome::Submitted {
            handle,
            invocations,
        })
    }

    async fn submit(&self, request: &CommandRequest) -> Result<ExecutionHandle> {
        let document = request.document().unwrap_or_default().to_string();
        let submission = SubmitCommand {
            document: document.clone(),
            instance_ids: request.instance_ids.clone(),
            parameters: request.parameters.clone(),
        };

        match self.fleet.submit_command(submission).await {
            Ok(handle) => {
                info!(
                    "[DISPATCH] Command sent for execution: document={} handle={}",
                    document, handle
                );
                Ok(handle)
            }
            Err(e) => {
                error!("[DISPATCH] Failed to submit {}: {}", document, e);
                Err(e).with_context(|| {
                    format!("submitting {} to {}", document, self.fleet.name())
                })
            }
        }
    }

    /// Poll one instance until its invocation reaches a terminal status
    ///
    /// There is no deadline: the loop relies on the backend eventually
    /// reporting a terminal status. Poll errors are logged and retried.
    pub async fn poll_until_done(
        &self,
        instance_id: &str,
        handle: &ExecutionHandle,
    ) -> CommandInvocation {
        loop {
            match self.fleet.get_command_status(instance_id, handle).await {
                Ok(invocation) if invocation.status.is_terminal() => {
                    info!(
                        "[DISPATCH] {} on {} finished: status={} response_code={}",
                        handle, instance_id, invocation.status, invocation.response_code
                    );
                    info!("[DISPATCH]   Status details: {}", invocation.status_details);
                    info!("[DISPATCH]   Output: {}", invocation.output);
                    return invocation;
                }
                Ok(invocation) => {
                    debug!(
                        "[DISPATCH] {} on {} is {}",
                        handle,
                        instance_id,
                        invocation.status
                    );
                }
                Err(e) => {
                    warn!(
                        "[DISPATCH] Status poll for {} on {} failed, retrying: {}",
                        handle, instance_id, e
                    );
                }
            }

            sleep(self.options.poll_interval).await;
        }
    }
}
