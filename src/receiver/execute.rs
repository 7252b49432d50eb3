//! Receiver for run-command requests

use super::{MessageHandler, MessageReceiver, Pump};
use crate::command::{DispatchOutcome, ExecutionDispatcher};
use crate::transport::{MessageChannel, QueueBinding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use rcworker_shared::codec::{self, Envelope};
use rcworker_shared::{worker, CommandRequest};
use std::sync::Arc;
use tracing::{info, warn};

/// Deserializes run-command messages and hands them to the dispatcher
pub struct ExecuteCommandReceiver {
    channel: Arc<dyn MessageChannel>,
    dispatcher: Arc<ExecutionDispatcher>,
    binding: QueueBinding,
    pump: Pump,
}

impl ExecuteCommandReceiver {
    pub fn new(channel: Arc<dyn MessageChannel>, dispatcher: Arc<ExecutionDispatcher>) -> Self {
        Self {
            channel,
            dispatcher,
            binding: QueueBinding::new(
                worker::RUN_COMMAND_QUEUE,
                worker::EXCHANGE,
                &[worker::RUN_COMMAND_ROUTING_KEY],
            ),
            pump: Pump::default(),
        }
    }

    /// Decode one message body and dispatch it
    ///
    /// A null, empty or malformed body is an error.
    pub async fn process_message(
        dispatcher: &ExecutionDispatcher,
        body: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let request: CommandRequest =
            codec::decode_body(body).context("decoding run-command message")?;

        info!("[RECEIVER] Sending command for execution:\n{}", request);

        dispatcher.dispatch(&request).await
    }
}

#[async_trait]
impl MessageReceiver for ExecuteCommandReceiver {
    async fn receive(&self) -> Result<()> {
        if self.pump.is_running() {
            warn!("[RECEIVER] {} is already receiving", self.name());
            return Ok(());
        }

        let subscription = self
            .channel
            .subscribe(self.binding.clone())
            .await
            .with_context(|| {
                format!(
                    "subscribing to {} on {}",
                    self.binding.queue,
                    self.channel.name()
                )
            })?;

        let dispatcher = self.dispatcher.clone();
        let handler: MessageHandler = Arc::new(move |envelope: Envelope| {
            let dispatcher = dispatcher.clone();
            async move {
                ExecuteCommandReceiver::process_message(&dispatcher, envelope.body.as_deref())
                    .await
                    .map(|_| ())
            }
            .boxed()
        });

        self.pump.start(self.name(), subscription, handler);
        Ok(())
    }

    async fn stop(&self) {
        self.pump.stop().await;
        info!("[RECEIVER] {} stopped", self.name());
    }

    fn name(&self) -> &'static str {
        "execute-command"
    }
}
