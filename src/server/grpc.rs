//! gRPC frontends for the `pulsemq.MessageQueue` service.
//!
//! Two service implementations share the schema: [`UnaryQueueService`]
//! answers `Produce`/`Consume` and rejects the stream, while
//! [`StreamingQueueService`] answers `StreamMessages` and rejects the unary
//! methods. Queue-state failures travel in-band in the response messages;
//! the RPC status stays OK so clients can distinguish backpressure from
//! transport trouble.

use crate::proto::message_queue_server::{MessageQueue, MessageQueueServer};
use crate::proto::{
    ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse, StreamMessage,
};
use crate::queue::Queue;
use crate::{PulsemqError, Result};
use bytes::Bytes;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info};

/// Maximum concurrent HTTP/2 streams per connection.
pub const MAX_CONCURRENT_STREAMS: u32 = 1_000_000;
/// Maximum size of a received message (1 KiB).
pub const MAX_RECEIVE_MESSAGE_SIZE: usize = 1024;
/// HTTP/2 stream and connection window size (32 KiB).
pub const WINDOW_SIZE: u32 = 32 * 1024;

/// Replies emitted per inbound stream frame before the peer must read.
const STREAM_REPLY_BUFFER: usize = 128;

type MessageStream = Pin<Box<dyn Stream<Item = std::result::Result<StreamMessage, Status>> + Send>>;

/// Unary-mode service: `Produce` and `Consume` only.
pub struct UnaryQueueService {
    queue: Arc<dyn Queue>,
}

impl UnaryQueueService {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }
}

#[tonic::async_trait]
impl MessageQueue for UnaryQueueService {
    async fn produce(
        &self,
        request: Request<ProduceRequest>,
    ) -> std::result::Result<Response<ProduceResponse>, Status> {
        let payload = Bytes::from(request.into_inner().payload);
        let reply = match self.queue.enqueue(payload) {
            Ok(()) => ProduceResponse {
                success: true,
                error: String::new(),
            },
            Err(e) => {
                debug!("produce rejected: {}", e);
                ProduceResponse {
                    success: false,
                    error: e.to_string(),
                }
            }
        };
        Ok(Response::new(reply))
    }

    async fn consume(
        &self,
        _request: Request<ConsumeRequest>,
    ) -> std::result::Result<Response<ConsumeResponse>, Status> {
        let reply = match self.queue.dequeue() {
            Ok(payload) => ConsumeResponse {
                payload: payload.to_vec(),
                error: String::new(),
            },
            Err(e) => ConsumeResponse {
                payload: Vec::new(),
                error: e.to_string(),
            },
        };
        Ok(Response::new(reply))
    }

    type StreamMessagesStream = MessageStream;

    async fn stream_messages(
        &self,
        _request: Request<Streaming<StreamMessage>>,
    ) -> std::result::Result<Response<Self::StreamMessagesStream>, Status> {
        Err(Status::unimplemented(
            "StreamMessages is not available in unary mode",
        ))
    }
}

/// Streaming-mode service: `StreamMessages` only.
///
/// Each inbound frame triggers exactly one outbound frame: an optional
/// enqueue of the frame's payload followed by one dequeue attempt whose
/// outcome fills the reply. Clients size their in-flight window against
/// this one-in-one-out coupling.
pub struct StreamingQueueService {
    queue: Arc<dyn Queue>,
}

impl StreamingQueueService {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }
}

#[tonic::async_trait]
impl MessageQueue for StreamingQueueService {
    async fn produce(
        &self,
        _request: Request<ProduceRequest>,
    ) -> std::result::Result<Response<ProduceResponse>, Status> {
        Err(Status::unimplemented(
            "Produce is not available in streaming mode",
        ))
    }

    async fn consume(
        &self,
        _request: Request<ConsumeRequest>,
    ) -> std::result::Result<Response<ConsumeResponse>, Status> {
        Err(Status::unimplemented(
            "Consume is not available in streaming mode",
        ))
    }

    type StreamMessagesStream = MessageStream;

    async fn stream_messages(
        &self,
        request: Request<Streaming<StreamMessage>>,
    ) -> std::result::Result<Response<Self::StreamMessagesStream>, Status> {
        let mut inbound = request.into_inner();
        let queue = Arc::clone(&self.queue);
        let (tx, rx) = mpsc::channel(STREAM_REPLY_BUFFER);

        tokio::spawn(async move {
            while let Some(frame) = inbound.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("stream recv error: {}", e);
                        break;
                    }
                };
                let reply = exchange(queue.as_ref(), Bytes::from(frame.payload));
                if tx.send(Ok(reply)).await.is_err() {
                    // Peer went away; the outbound side is closed.
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// One stream exchange: enqueue the inbound payload if present, then couple
/// it with one dequeue attempt.
///
/// A refused inbound enqueue drops the payload silently: the metrics layer
/// records successful operations only, so nothing beyond a debug log marks
/// the loss. The reply's error field reflects the dequeue side alone.
fn exchange(queue: &dyn Queue, payload: Bytes) -> StreamMessage {
    if !payload.is_empty() {
        if let Err(e) = queue.enqueue(payload) {
            debug!("stream enqueue rejected: {}", e);
        }
    }
    match queue.dequeue() {
        Ok(payload) => StreamMessage {
            payload: payload.to_vec(),
            error: String::new(),
        },
        Err(e) => StreamMessage {
            payload: Vec::new(),
            error: e.to_string(),
        },
    }
}

/// Serve the unary service on `addr`.
pub async fn serve_unary(queue: Arc<dyn Queue>, addr: SocketAddr) -> Result<()> {
    info!("gRPC server (unary) listening on {}", addr);
    serve(
        MessageQueueServer::new(UnaryQueueService::new(queue))
            .max_decoding_message_size(MAX_RECEIVE_MESSAGE_SIZE),
        addr,
    )
    .await
}

/// Serve the streaming service on `addr`.
pub async fn serve_stream(queue: Arc<dyn Queue>, addr: SocketAddr) -> Result<()> {
    info!("gRPC server (streaming) listening on {}", addr);
    serve(
        MessageQueueServer::new(StreamingQueueService::new(queue))
            .max_decoding_message_size(MAX_RECEIVE_MESSAGE_SIZE),
        addr,
    )
    .await
}

async fn serve<S>(service: MessageQueueServer<S>, addr: SocketAddr) -> Result<()>
where
    S: MessageQueue,
{
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(crate::proto::FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(|e| PulsemqError::Config(format!("failed to build reflection service: {}", e)))?;

    Server::builder()
        .max_concurrent_streams(MAX_CONCURRENT_STREAMS)
        .initial_stream_window_size(WINDOW_SIZE)
        .initial_connection_window_size(WINDOW_SIZE)
        .add_service(service)
        .add_service(reflection)
        .serve(addr)
        .await?;
    Ok(())
}
