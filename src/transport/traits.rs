//! Message channel trait abstraction for pluggable queue transports

use super::router::Subscription;
use anyhow::Result;
use async_trait::async_trait;
use rcworker_shared::codec::Envelope;

/// What a receiver subscribes to: a named queue bound to an exchange
/// for a set of routing keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub exchange: String,
    pub routing_keys: Vec<String>,
}

impl QueueBinding {
    pub fn new(
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_keys: &[&str],
    ) -> Self {
        Self {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_keys: routing_keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Whether a published envelope should be delivered to this binding
    pub fn matches(&self, envelope: &Envelope) -> bool {
        self.exchange == envelope.exchange
            && self.routing_keys.iter().any(|k| *k == envelope.routing_key)
    }
}

/// A source of routed messages
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Start delivering envelopes that match `binding`
    ///
    /// Delivery stops when the returned subscription is dropped.
    async fn subscribe(&self, binding: QueueBinding) -> Result<Subscription>;

    /// Human-readable name for this channel
    fn name(&self) -> &'static str;
}
