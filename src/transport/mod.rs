#[cfg(test)]
pub mod memory;
pub mod router;
pub mod tcp;
pub mod traits;

#[cfg(test)]
pub use memory::MemoryChannel;
pub use router::Subscription;
pub use tcp::TcpChannel;
pub use traits::{MessageChannel, QueueBinding};
