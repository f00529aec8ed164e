//! # PulseMQ Core Library
//!
//! PulseMQ is an in-process message broker that moves opaque binary payloads
//! from producers to consumers through a single bounded, in-memory queue.
//! Three interchangeable network frontends expose the same two primitives
//! (enqueue one payload, dequeue one payload):
//!
//! - **WebSocket** — `/ws/publish` and `/ws/consume` endpoints
//! - **gRPC unary** — `Produce` / `Consume` methods
//! - **gRPC streaming** — `StreamMessages`, one enqueue coupled with one
//!   dequeue per exchanged frame
//!
//! ## Architecture
//!
//! - [`queue`] - Lock-free bounded MPMC ring queue
//! - [`metrics`] - Metrics collectors and the instrumented queue decorator
//! - [`server`] - WebSocket and gRPC frontend adapters
//! - [`http_server`] - Prometheus exposition and health endpoints
//! - [`config`] - Startup mode selection and server settings
//!
//! Every frontend holds a shared handle to an [`InstrumentedQueue`], which
//! records counters, a depth gauge, and an enqueue-latency histogram around
//! the underlying [`RingQueue`]. Backpressure (`Full`/`Empty`) is delivered
//! in-band to peers; it is never a transport-level failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsemq::{InstrumentedQueue, PrometheusMetrics, Queue, RingQueue};
//! use std::sync::Arc;
//!
//! # fn main() -> pulsemq::Result<()> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let ring = Arc::new(RingQueue::new(1024));
//! let queue = InstrumentedQueue::new(ring, metrics);
//! queue.enqueue(bytes::Bytes::from_static(b"hello")).unwrap();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http_server;
pub mod metrics;
pub mod queue;
pub mod server;

/// Generated gRPC types for the `pulsemq.MessageQueue` service.
pub mod proto {
    tonic::include_proto!("pulsemq");

    /// Encoded file descriptor set, consumed by the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("pulsemq_descriptor");
}

pub use config::{ServerConfig, ServerMode};
pub use http_server::HttpMetricsServer;
pub use metrics::{
    DefaultMetrics, InstrumentedQueue, MetricsCollector, MetricsSnapshot, PrometheusMetrics,
};
pub use queue::{Message, Queue, QueueError, RingQueue};
pub use server::{StreamingQueueService, UnaryQueueService, WsServer};

use thiserror::Error;

/// PulseMQ error types.
///
/// Queue-state conditions ([`QueueError`]) are deliberately not part of this
/// enum: `Full` and `Empty` are expected backpressure signals that frontends
/// translate into in-band replies, while `PulsemqError` covers conditions
/// that abort startup or a server loop.
#[derive(Debug, Error)]
pub enum PulsemqError {
    /// Socket and listener I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level failures outside std I/O
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid startup configuration, including ambiguous mode selection
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metric registration or encoding failures
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// gRPC transport setup and serve failures
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Result type alias used throughout PulseMQ.
pub type Result<T> = std::result::Result<T, PulsemqError>;
