//! Network frontends.
//!
//! Each adapter translates its wire format into the same two queue
//! primitives. All of them hold a shared, non-owning [`crate::Queue`]
//! handle; none of them own the queue or each other.

pub mod grpc;
pub mod ws;

pub use grpc::{StreamingQueueService, UnaryQueueService};
pub use ws::WsServer;
