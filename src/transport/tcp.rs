//! TCP channel: publishers connect and push length-prefixed envelopes

use super::router::{Router, Subscription};
use super::traits::{MessageChannel, QueueBinding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rcworker_shared::codec::FrameDecoder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Accepts publisher connections and routes every decoded envelope
///
/// Dropping the channel stops the accept loop and closes every publisher
/// connection.
pub struct TcpChannel {
    router: Arc<Router>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl TcpChannel {
    /// Bind the listener and start accepting publishers
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding message channel on {}", addr))?;
        let local_addr = listener.local_addr()?;
        info!("[CHANNEL] Listening for publishers on {}", local_addr);

        let router = Router::new();
        let accept_task = tokio::spawn(accept_loop(listener, router.clone()));

        Ok(Self {
            router,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl MessageChannel for TcpChannel {
    async fn subscribe(&self, binding: QueueBinding) -> Result<Subscription> {
        Ok(self.router.register(binding))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

async fn accept_loop(listener: TcpListener, router: Arc<Router>) {
    // Dropped with the task, which aborts every connection
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, addr)) => {
                    info!("[CHANNEL] Publisher connected: {}", addr);
                    connections.spawn(read_publisher(socket, addr, router.clone()));
                }
                Err(e) => {
                    error!("[CHANNEL] Accept failed: {}", e);
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn read_publisher(mut socket: TcpStream, addr: SocketAddr, router: Arc<Router>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        match socket.read(&mut buf).await {
            Ok(0) => {
                info!("[CHANNEL] Publisher disconnected: {}", addr);
                return;
            }
            Ok(n) => {
                decoder.extend(&buf[..n]);

                // Process all complete frames
                loop {
                    match decoder.decode_next() {
                        Ok(Some(envelope)) => {
                            debug!(
                                "[CHANNEL] {} published to {}/{}",
                                addr, envelope.exchange, envelope.routing_key
                            );
                            router.route(envelope).await;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            // Framing is lost, nothing after this point can be trusted
                            warn!("[CHANNEL] Bad frame from {}, closing: {}", addr, e);
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!("[CHANNEL] Read error from {}: {}", addr, e);
                return;
            }
        }
    }
}
