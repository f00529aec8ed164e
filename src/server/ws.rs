//! WebSocket frontend.
//!
//! Two endpoints, one primitive each. `/ws/publish` enqueues every received
//! frame and answers with a text `ok` or `error: <reason>`. `/ws/consume`
//! treats any received frame as a pull signal and answers with the dequeued
//! payload as a binary frame, or `error: queue is empty` as text. Protocol
//! errors end the connection; they never touch the queue.

use crate::queue::Queue;
use crate::{PulsemqError, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub struct WsServer {
    queue: Arc<dyn Queue>,
}

impl WsServer {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws/publish", get(publish_handler))
            .route("/ws/consume", get(consume_handler))
            .with_state(Arc::clone(&self.queue))
    }

    /// Bind the listener and serve publish/consume connections until the
    /// process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            PulsemqError::Network(format!("failed to bind WebSocket server to {}: {}", addr, e))
        })?;
        info!(
            "WebSocket server listening on {} (endpoints: /ws/publish, /ws/consume)",
            addr
        );

        axum::serve(listener, router)
            .await
            .map_err(|e| PulsemqError::Network(format!("WebSocket server error: {}", e)))?;
        Ok(())
    }
}

async fn publish_handler(State(queue): State<Arc<dyn Queue>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| publish_loop(socket, queue))
}

async fn consume_handler(State(queue): State<Arc<dyn Queue>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| consume_loop(socket, queue))
}

async fn publish_loop(mut socket: WebSocket, queue: Arc<dyn Queue>) {
    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("publish read error: {}", e);
                break;
            }
        };
        // Text and binary frames are both opaque payloads.
        let payload = match frame {
            Message::Binary(bytes) => Bytes::from(bytes),
            Message::Text(text) => Bytes::from(text.into_bytes()),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        if let Err(e) = socket.send(publish_reply(queue.as_ref(), payload)).await {
            debug!("publish write error: {}", e);
            break;
        }
    }
}

async fn consume_loop(mut socket: WebSocket, queue: Arc<dyn Queue>) {
    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("consume read error: {}", e);
                break;
            }
        };
        // Any data frame is a pull signal; its contents are ignored.
        match frame {
            Message::Binary(_) | Message::Text(_) => {}
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        }
        if let Err(e) = socket.send(consume_reply(queue.as_ref())).await {
            debug!("consume write error: {}", e);
            break;
        }
    }
}

fn publish_reply(queue: &dyn Queue, payload: Bytes) -> Message {
    match queue.enqueue(payload) {
        Ok(()) => Message::Text("ok".to_string()),
        Err(e) => {
            debug!("enqueue rejected: {}", e);
            Message::Text(format!("error: {}", e))
        }
    }
}

fn consume_reply(queue: &dyn Queue) -> Message {
    match queue.dequeue() {
        Ok(payload) => Message::Binary(payload.to_vec()),
        Err(e) => Message::Text(format!("error: {}", e)),
    }
}
