//! Message receivers
//!
//! A receiver owns one subscription for as long as it runs. Each delivered
//! message is processed on its own task so a slow dispatch never holds up
//! the next delivery.

mod echo;
mod execute;

pub use echo::EchoReceiver;
pub use execute::ExecuteCommandReceiver;

use crate::transport::Subscription;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use rcworker_shared::codec::Envelope;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Processes one delivered envelope
pub type MessageHandler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A long-lived consumer of one channel binding
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Subscribe and start processing deliveries
    async fn receive(&self) -> Result<()>;

    /// Release the subscription. Messages already being processed keep running.
    async fn stop(&self);

    /// Human-readable name for this receiver
    fn name(&self) -> &'static str;
}

/// Background task pumping a subscription into a handler
///
/// Dropping the pump aborts the task, which releases the subscription.
#[derive(Default)]
pub struct Pump {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Pump {
    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start pumping; returns false (dropping `subscription`) if already running
    pub fn start(
        &self,
        name: &'static str,
        subscription: Subscription,
        handler: MessageHandler,
    ) -> bool {
        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        *task = Some(tokio::spawn(run_pump(name, subscription, handler)));
        true
    }

    /// Abort the pump task and wait until the subscription is released
    pub async fn stop(&self) {
        let task = self.lock_task().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

async fn run_pump(name: &'static str, mut subscription: Subscription, handler: MessageHandler) {
    info!(
        "[RECEIVER] {} consuming queue {}",
        name,
        subscription.binding().queue
    );

    while let Some(envelope) = subscription.next().await {
        let handler = handler.clone();

        // Detached: the task ends in the failed state if processing fails
        tokio::spawn(async move {
            let result = handler(envelope).await;
            if let Err(e) = &result {
                error!("[RECEIVER] {} failed to process message: {:#}", name, e);
            }
            result
        });
    }

    info!("[RECEIVER] {} subscription closed", name);
}
