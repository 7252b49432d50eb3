//! Receiver that logs echo commands, useful to check a publisher is wired up

use super::{MessageHandler, MessageReceiver, Pump};
use crate::transport::{MessageChannel, QueueBinding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use rcworker_shared::codec::{self, Envelope};
use rcworker_shared::{worker, EchoCommand};
use std::sync::Arc;
use tracing::{info, warn};

pub struct EchoReceiver {
    channel: Arc<dyn MessageChannel>,
    binding: QueueBinding,
    pump: Pump,
}

impl EchoReceiver {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            binding: QueueBinding::new(
                worker::ECHO_QUEUE,
                worker::EXCHANGE,
                &[worker::ECHO_ROUTING_KEY],
            ),
            pump: Pump::default(),
        }
    }

    pub fn process_message(body: Option<&str>) -> Result<EchoCommand> {
        let command: EchoCommand = codec::decode_body(body).context("decoding echo message")?;
        info!("[RECEIVER] Echo received: {}", command);
        Ok(command)
    }
}

#[async_trait]
impl MessageReceiver for EchoReceiver {
    async fn receive(&self) -> Result<()> {
        if self.pump.is_running() {
            warn!("[RECEIVER] {} is already receiving", self.name());
            return Ok(());
        }

        let subscription = self
            .channel
            .subscribe(self.binding.clone())
            .await
            .with_context(|| format!("subscribing to {}", self.binding.queue))?;

        let handler: MessageHandler = Arc::new(|envelope: Envelope| {
            async move { EchoReceiver::process_message(envelope.body.as_deref()).map(|_| ()) }.boxed()
        });

        self.pump.start(self.name(), subscription, handler);
        Ok(())
    }

    async fn stop(&self) {
        self.pump.stop().await;
        info!("[RECEIVER] {} stopped", self.name());
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
