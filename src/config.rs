//! Startup configuration: frontend mode selection and listener settings.
//!
//! The frontend mode is an environment-variable contract: exactly one of
//! `WS_MODE`, `RPC_MODE`, or `RPC_STREAM_MODE` must be set to `1`. Any other
//! combination is a fatal configuration error. Everything else (addresses,
//! ports, queue capacity) comes from the CLI with sensible defaults.

use crate::{PulsemqError, Result};
use std::net::SocketAddr;

/// Which network frontend this process serves. Exactly one per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// WebSocket publish/consume endpoints on the WebSocket port
    WebSocket,
    /// gRPC unary Produce/Consume on the gRPC port
    RpcUnary,
    /// gRPC bidirectional StreamMessages on the gRPC port
    RpcStream,
}

impl ServerMode {
    /// Resolve the mode from `WS_MODE`, `RPC_MODE`, and `RPC_STREAM_MODE`.
    ///
    /// Values are parsed as integers; unset or unparseable variables count
    /// as 0.
    pub fn from_env() -> Result<Self> {
        Self::from_flags(
            mode_flag("WS_MODE"),
            mode_flag("RPC_MODE"),
            mode_flag("RPC_STREAM_MODE"),
        )
    }

    fn from_flags(ws: bool, rpc: bool, rpc_stream: bool) -> Result<Self> {
        match (ws, rpc, rpc_stream) {
            (true, false, false) => Ok(ServerMode::WebSocket),
            (false, true, false) => Ok(ServerMode::RpcUnary),
            (false, false, true) => Ok(ServerMode::RpcStream),
            _ => Err(PulsemqError::Config(
                "exactly one of WS_MODE, RPC_MODE, or RPC_STREAM_MODE must be set to 1"
                    .to_string(),
            )),
        }
    }
}

fn mode_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
        == 1
}

/// Listener and queue settings shared by all modes.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind all listeners on
    pub host: String,
    /// WebSocket frontend port
    pub ws_port: u16,
    /// gRPC frontend port (unary and streaming modes)
    pub grpc_port: u16,
    /// Prometheus exposition port
    pub metrics_port: u16,
    /// Ring queue capacity in messages
    pub queue_capacity: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ws_port: 8081,
            grpc_port: 50051,
            metrics_port: 8080,
            queue_capacity: 1_000_000,
        }
    }
}

impl ServerConfig {
    pub fn ws_addr(&self) -> Result<SocketAddr> {
        self.addr(self.ws_port)
    }

    pub fn grpc_addr(&self) -> Result<SocketAddr> {
        self.addr(self.grpc_port)
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.addr(self.metrics_port)
    }

    fn addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|e| PulsemqError::Config(format!("invalid listen address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flag_selects_mode() {
        assert_eq!(
            ServerMode::from_flags(true, false, false).unwrap(),
            ServerMode::WebSocket
        );
        assert_eq!(
            ServerMode::from_flags(false, true, false).unwrap(),
            ServerMode::RpcUnary
        );
        assert_eq!(
            ServerMode::from_flags(false, false, true).unwrap(),
            ServerMode::RpcStream
        );
    }

    #[test]
    fn ambiguous_flags_are_fatal() {
        assert!(ServerMode::from_flags(false, false, false).is_err());
        assert!(ServerMode::from_flags(true, true, false).is_err());
        assert!(ServerMode::from_flags(true, true, true).is_err());
    }

    #[test]
    fn default_ports_parse_to_addrs() {
        let config = ServerConfig::default();
        assert_eq!(config.ws_addr().unwrap().port(), 8081);
        assert_eq!(config.grpc_addr().unwrap().port(), 50051);
        assert_eq!(config.metrics_addr().unwrap().port(), 8080);
    }

    #[test]
    fn bad_host_is_config_error() {
        let config = ServerConfig {
            host: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.metrics_addr().is_err());
    }
}
