//! In-process channel for receiver tests

use super::router::{Router, Subscription};
use super::traits::{MessageChannel, QueueBinding};
use anyhow::Result;
use async_trait::async_trait;
use rcworker_shared::codec::Envelope;
use std::sync::Arc;

#[derive(Clone)]
pub struct MemoryChannel {
    router: Arc<Router>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Publish an envelope, returning how many subscriptions received it
    pub async fn publish(&self, envelope: Envelope) -> usize {
        self.router.route(envelope).await
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn subscribe(&self, binding: QueueBinding) -> Result<Subscription> {
        Ok(self.router.register(binding))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
