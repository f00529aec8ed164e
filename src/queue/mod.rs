//! Bounded in-memory message queue.
//!
//! The queue moves opaque [`Bytes`] payloads between concurrent producers
//! and consumers without blocking: a full queue refuses an enqueue with
//! [`QueueError::Full`] and an empty queue refuses a dequeue with
//! [`QueueError::Empty`]. Frontends treat both as ordinary backpressure and
//! relay them in-band to the peer.

mod message;
mod ring;


pub use message::Message;
pub use ring::RingQueue;

use bytes::Bytes;
use thiserror::Error;

/// Expected queue-state conditions.
///
/// The `Display` strings are part of the wire contract: frontends embed them
/// verbatim in their in-band error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue holds `capacity` messages; the enqueue was refused.
    #[error("queue is full")]
    Full,
    /// The queue holds no messages; the dequeue was refused.
    #[error("queue is empty")]
    Empty,
}

/// Capability contract shared by the ring queue and its decorators.
///
/// Frontend adapters depend on this trait rather than a concrete queue, so
/// the instrumented decorator substitutes transparently and tests can inject
/// a deterministic queue.
pub trait Queue: Send + Sync {
    /// Append one payload. Fails fast with [`QueueError::Full`]; never blocks.
    fn enqueue(&self, payload: Bytes) -> Result<(), QueueError>;

    /// Remove and return the oldest payload. Fails fast with
    /// [`QueueError::Empty`]; never blocks.
    fn dequeue(&self) -> Result<Bytes, QueueError>;

    /// Current element count. May be observed-stale under concurrent
    /// traffic, but never exceeds the capacity.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
