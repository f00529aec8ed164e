use clap::Parser;
use pulsemq::metrics::spawn_throughput_sampler;
use pulsemq::{
    server, HttpMetricsServer, InstrumentedQueue, MetricsCollector, PrometheusMetrics, Queue,
    Result, RingQueue, ServerConfig, ServerMode, WsServer,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pulsemq")]
#[command(about = "An in-process message broker with WebSocket and gRPC frontends")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// WebSocket frontend port (WS_MODE)
    #[arg(long, default_value_t = 8081)]
    ws_port: u16,

    /// gRPC frontend port (RPC_MODE / RPC_STREAM_MODE)
    #[arg(long, default_value_t = 50051)]
    grpc_port: u16,

    /// Prometheus exposition port
    #[arg(long, default_value_t = 8080)]
    metrics_port: u16,

    /// Ring queue capacity in messages
    #[arg(long, default_value_t = 1_000_000)]
    queue_capacity: u64,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    // Exactly one of WS_MODE, RPC_MODE, RPC_STREAM_MODE selects the frontend.
    let mode = ServerMode::from_env()?;

    let config = ServerConfig {
        host: args.host,
        ws_port: args.ws_port,
        grpc_port: args.grpc_port,
        metrics_port: args.metrics_port,
        queue_capacity: args.queue_capacity,
    };

    info!("starting pulsemq in {:?} mode", mode);
    info!("queue capacity: {}", config.queue_capacity);

    let metrics = Arc::new(PrometheusMetrics::new()?);
    let collector: Arc<dyn MetricsCollector> = Arc::clone(&metrics) as Arc<dyn MetricsCollector>;
    let ring = Arc::new(RingQueue::new(config.queue_capacity));
    let queue: Arc<dyn Queue> = Arc::new(InstrumentedQueue::new(ring, Arc::clone(&collector)));

    // Shutdown coordination for background tasks.
    let (shutdown_tx, _) = broadcast::channel(16);
    let sampler = spawn_throughput_sampler(collector, shutdown_tx.subscribe());

    let metrics_server = HttpMetricsServer::new(Arc::clone(&metrics), config.metrics_addr()?);

    let result = tokio::select! {
        result = run_frontend(mode, Arc::clone(&queue), &config) => result,
        result = metrics_server.start() => result,
        _ = signal::ctrl_c() => {
            info!("received ctrl-c, shutting down gracefully");
            Ok(())
        }
    };

    // Stop the sampler before the metrics store goes away.
    let _ = shutdown_tx.send(());
    let _ = sampler.await;

    info!("pulsemq shut down");
    result
}

async fn run_frontend(mode: ServerMode, queue: Arc<dyn Queue>, config: &ServerConfig) -> Result<()> {
    match mode {
        ServerMode::WebSocket => WsServer::new(queue).run(config.ws_addr()?).await,
        ServerMode::RpcUnary => server::grpc::serve_unary(queue, config.grpc_addr()?).await,
        ServerMode::RpcStream => server::grpc::serve_stream(queue, config.grpc_addr()?).await,
    }
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("Invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
