//! Routing table shared by the channel implementations

use super::traits::QueueBinding;
use rcworker_shared::codec::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Buffered deliveries per subscription before publishers wait
const SUBSCRIPTION_BUFFER: usize = 100;

struct Route {
    binding: QueueBinding,
    tx: mpsc::Sender<Envelope>,
}

/// Fans published envelopes out to every matching subscription
#[derive(Default)]
pub struct Router {
    next_id: AtomicU64,
    /// Never held across an await
    routes: Mutex<HashMap<u64, Route>>,
}

impl Router {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a binding and return the subscription that receives its messages
    pub fn register(self: &Arc<Self>, binding: QueueBinding) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        debug!(
            "[CHANNEL] Subscription {} bound queue {} to {} {:?}",
            id, binding.queue, binding.exchange, binding.routing_keys
        );

        self.lock_routes().insert(
            id,
            Route {
                binding: binding.clone(),
                tx,
            },
        );

        Subscription {
            id,
            binding,
            rx,
            router: Arc::downgrade(self),
        }
    }

    /// Deliver an envelope to every matching subscription
    ///
    /// Returns the number of subscriptions it was delivered to.
    pub async fn route(&self, envelope: Envelope) -> usize {
        let targets: Vec<(u64, mpsc::Sender<Envelope>)> = self
            .lock_routes()
            .iter()
            .filter(|(_, route)| route.binding.matches(&envelope))
            .map(|(id, route)| (*id, route.tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            if tx.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            } else {
                self.remove(id);
            }
        }

        if delivered == 0 {
            debug!(
                "[CHANNEL] No subscription for {}/{}, message dropped",
                envelope.exchange, envelope.routing_key
            );
        }

        delivered
    }

    /// Number of live subscriptions
    #[cfg(test)]
    pub fn subscription_count(&self) -> usize {
        self.lock_routes().len()
    }

    fn remove(&self, id: u64) {
        if self.lock_routes().remove(&id).is_some() {
            debug!("[CHANNEL] Subscription {} removed", id);
        }
    }

    fn lock_routes(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Route>> {
        // A poisoned table is still structurally valid
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live subscription to a channel
///
/// Dropping it removes the route, so nothing more is delivered.
pub struct Subscription {
    id: u64,
    binding: QueueBinding,
    rx: mpsc::Receiver<Envelope>,
    router: Weak<Router>,
}

impl Subscription {
    /// Receive the next delivered envelope
    ///
    /// Returns `None` once the channel behind the subscription is gone.
    pub async fn next(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn binding(&self) -> &QueueBinding {
        &self.binding
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.remove(self.id);
        }
    }
}
