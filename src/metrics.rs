//! # Metrics Collection
//!
//! Lock-free instrumentation around the queue's two primitives. The hot
//! path records through atomic adds and stores only; rate derivation runs
//! in a 1 Hz background task so the message path never computes deltas.
//!
//! Two interchangeable collectors sit behind [`MetricsCollector`]:
//!
//! - [`DefaultMetrics`] — plain atomic counters with in-process readback
//!   via [`MetricsCollector::get_throughput`] and
//!   [`MetricsCollector::get_queue_depth`]. Latency observation is a no-op.
//! - [`PrometheusMetrics`] — the same counters mirrored into a
//!   [`prometheus::Registry`], plus throughput gauges and an
//!   enqueue-latency histogram. Readback happens through the scrape
//!   endpoint, so the in-process getters return zero.
//!
//! [`InstrumentedQueue`] composes a collector with any [`Queue`]: it runs
//! the underlying operation and records only when the operation succeeded.
//! Full and Empty are backpressure, not traffic — counting them would
//! distort both rates and the depth gauge.

use crate::queue::{Queue, QueueError};
use bytes::Bytes;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::interval;

/// Capability set for observing queue operations.
///
/// All methods must be safe under concurrent callers; implementations use
/// atomic mutation only.
pub trait MetricsCollector: Send + Sync {
    /// Count one successful enqueue.
    fn inc_enqueue(&self);

    /// Count one successful dequeue.
    fn inc_dequeue(&self);

    /// Record the queue depth observed after an admitted operation.
    fn set_queue_depth(&self, depth: u64);

    /// Record the wall-clock duration of one admitted enqueue.
    fn observe_enqueue_latency(&self, elapsed: Duration);

    /// Messages per second (enqueue, dequeue) since the last sample tick.
    /// Scrape-backed collectors return `(0, 0)`.
    fn get_throughput(&self) -> (u64, u64);

    /// Latest recorded depth. Scrape-backed collectors return `0`.
    fn get_queue_depth(&self) -> u64;

    /// Advance the throughput snapshot. Driven at 1 Hz by
    /// [`spawn_throughput_sampler`].
    fn sample(&self);
}

/// Drive a collector's [`sample`](MetricsCollector::sample) once per second
/// until the shutdown channel fires.
///
/// The caller signals shutdown and awaits the returned handle before
/// dropping the metrics store.
pub fn spawn_throughput_sampler(
    collector: Arc<dyn MetricsCollector>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = tick.tick() => collector.sample(),
                _ = shutdown.recv() => break,
            }
        }
    })
}

/// In-process collector backed by bare atomics.
#[derive(Debug, Default)]
pub struct DefaultMetrics {
    enqueue_count: AtomicU64,
    dequeue_count: AtomicU64,
    last_enqueue: AtomicU64,
    last_dequeue: AtomicU64,
    queue_depth: AtomicU64,
}

impl DefaultMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetrics {
    #[inline(always)]
    fn inc_enqueue(&self) {
        self.enqueue_count.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    fn inc_dequeue(&self) {
        self.dequeue_count.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    fn set_queue_depth(&self, depth: u64) {
        self.queue_depth.store(depth, Ordering::Release);
    }

    fn observe_enqueue_latency(&self, _elapsed: Duration) {}

    fn get_throughput(&self) -> (u64, u64) {
        let enqueue = self.enqueue_count.load(Ordering::Acquire);
        let dequeue = self.dequeue_count.load(Ordering::Acquire);
        let last_enqueue = self.last_enqueue.load(Ordering::Acquire);
        let last_dequeue = self.last_dequeue.load(Ordering::Acquire);
        (
            enqueue.saturating_sub(last_enqueue),
            dequeue.saturating_sub(last_dequeue),
        )
    }

    fn get_queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Acquire)
    }

    fn sample(&self) {
        self.last_enqueue
            .store(self.enqueue_count.load(Ordering::Acquire), Ordering::Release);
        self.last_dequeue
            .store(self.dequeue_count.load(Ordering::Acquire), Ordering::Release);
    }
}

/// Collector that exposes the queue metrics to Prometheus.
///
/// Owns its own [`Registry`] rather than the process-global one so tests can
/// construct fresh instances per case. The shadow atomic counters exist for
/// throughput derivation; the registered collectors are the scrape surface.
#[derive(Debug)]
pub struct PrometheusMetrics {
    registry: Registry,
    enqueue_counter: IntCounter,
    dequeue_counter: IntCounter,
    queue_depth: IntGauge,
    enqueue_throughput: IntGauge,
    dequeue_throughput: IntGauge,
    enqueue_latency: Histogram,

    enqueue_count: AtomicU64,
    dequeue_count: AtomicU64,
    last_enqueue_count: AtomicU64,
    last_dequeue_count: AtomicU64,
}

impl PrometheusMetrics {
    /// Create the collector and register all metrics with a fresh registry.
    pub fn new() -> crate::Result<Self> {
        let enqueue_counter = IntCounter::new(
            "unnamedmq_enqueue_total",
            "Total number of enqueued messages",
        )?;
        let dequeue_counter = IntCounter::new(
            "unnamedmq_dequeue_total",
            "Total number of dequeued messages",
        )?;
        let queue_depth = IntGauge::new("unnamedmq_queue_depth", "Current queue depth")?;
        let enqueue_throughput = IntGauge::new(
            "unnamedmq_enqueue_throughput",
            "Enqueue throughput (messages per second)",
        )?;
        let dequeue_throughput = IntGauge::new(
            "unnamedmq_dequeue_throughput",
            "Dequeue throughput (messages per second)",
        )?;
        let enqueue_latency = Histogram::with_opts(
            HistogramOpts::new(
                "unnamedmq_enqueue_latency_seconds",
                "Histogram of enqueue latencies in seconds",
            )
            // 100us to ~3s
            .buckets(prometheus::exponential_buckets(0.0001, 2.0, 16)?),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(enqueue_counter.clone()))?;
        registry.register(Box::new(dequeue_counter.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(enqueue_throughput.clone()))?;
        registry.register(Box::new(dequeue_throughput.clone()))?;
        registry.register(Box::new(enqueue_latency.clone()))?;

        Ok(Self {
            registry,
            enqueue_counter,
            dequeue_counter,
            queue_depth,
            enqueue_throughput,
            dequeue_throughput,
            enqueue_latency,
            enqueue_count: AtomicU64::new(0),
            dequeue_count: AtomicU64::new(0),
            last_enqueue_count: AtomicU64::new(0),
            last_dequeue_count: AtomicU64::new(0),
        })
    }

    /// Registry holding this collector's metric families.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
            tracing::error!("failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Point-in-time totals for the JSON endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueue_total: self.enqueue_counter.get(),
            dequeue_total: self.dequeue_counter.get(),
            queue_depth: self.queue_depth.get().max(0) as u64,
            enqueue_per_sec: self.enqueue_throughput.get().max(0) as u64,
            dequeue_per_sec: self.dequeue_throughput.get().max(0) as u64,
        }
    }
}

impl MetricsCollector for PrometheusMetrics {
    #[inline(always)]
    fn inc_enqueue(&self) {
        self.enqueue_counter.inc();
        self.enqueue_count.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    fn inc_dequeue(&self) {
        self.dequeue_counter.inc();
        self.dequeue_count.fetch_add(1, Ordering::Release);
    }

    #[inline(always)]
    fn set_queue_depth(&self, depth: u64) {
        self.queue_depth.set(depth as i64);
    }

    fn observe_enqueue_latency(&self, elapsed: Duration) {
        self.enqueue_latency.observe(elapsed.as_secs_f64());
    }

    // The scrape endpoint is the readback path for this collector.
    fn get_throughput(&self) -> (u64, u64) {
        (0, 0)
    }

    fn get_queue_depth(&self) -> u64 {
        0
    }

    fn sample(&self) {
        let enqueue = self.enqueue_count.load(Ordering::Acquire);
        let dequeue = self.dequeue_count.load(Ordering::Acquire);
        let last_enqueue = self.last_enqueue_count.swap(enqueue, Ordering::AcqRel);
        let last_dequeue = self.last_dequeue_count.swap(dequeue, Ordering::AcqRel);
        self.enqueue_throughput
            .set(enqueue.saturating_sub(last_enqueue) as i64);
        self.dequeue_throughput
            .set(dequeue.saturating_sub(last_dequeue) as i64);
    }
}

/// Point-in-time metric totals, serialized by the HTTP `/metrics/json`
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub enqueue_total: u64,
    pub dequeue_total: u64,
    pub queue_depth: u64,
    pub enqueue_per_sec: u64,
    pub dequeue_per_sec: u64,
}

/// Decorator that records metrics around every admitted queue operation.
///
/// Implements the same [`Queue`] contract as the inner queue, so frontends
/// compose against it without knowing whether instrumentation is present.
pub struct InstrumentedQueue {
    queue: Arc<dyn Queue>,
    metrics: Arc<dyn MetricsCollector>,
}

impl InstrumentedQueue {
    pub fn new(queue: Arc<dyn Queue>, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self { queue, metrics }
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }
}

impl Queue for InstrumentedQueue {
    fn enqueue(&self, payload: Bytes) -> Result<(), QueueError> {
        let start = Instant::now();
        let result = self.queue.enqueue(payload);
        if result.is_ok() {
            self.metrics.inc_enqueue();
            self.metrics.set_queue_depth(self.queue.len());
            self.metrics.observe_enqueue_latency(start.elapsed());
        }
        result
    }

    fn dequeue(&self) -> Result<Bytes, QueueError> {
        let result = self.queue.dequeue();
        if result.is_ok() {
            self.metrics.inc_dequeue();
            self.metrics.set_queue_depth(self.queue.len());
        }
        result
    }

    fn len(&self) -> u64 {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::RingQueue;

    #[test]
    fn default_metrics_counts_and_derives_throughput() {
        let metrics = DefaultMetrics::new();
        for _ in 0..10 {
            metrics.inc_enqueue();
        }
        for _ in 0..4 {
            metrics.inc_dequeue();
        }
        metrics.set_queue_depth(6);

        assert_eq!(metrics.get_queue_depth(), 6);
        assert_eq!(metrics.get_throughput(), (10, 4));

        // After a sample tick the delta resets; new traffic accrues on top.
        metrics.sample();
        assert_eq!(metrics.get_throughput(), (0, 0));
        metrics.inc_enqueue();
        assert_eq!(metrics.get_throughput(), (1, 0));
    }

    #[test]
    fn default_metrics_latency_accepts_any_duration() {
        let metrics = DefaultMetrics::new();
        metrics.observe_enqueue_latency(Duration::ZERO);
        metrics.observe_enqueue_latency(Duration::from_secs(3600));
    }

    #[test]
    fn prometheus_metrics_expose_exact_names_and_totals() {
        let metrics = PrometheusMetrics::new().unwrap();
        for _ in 0..10 {
            metrics.inc_enqueue();
        }
        for _ in 0..4 {
            metrics.inc_dequeue();
        }
        metrics.set_queue_depth(6);

        let text = metrics.encode_text();
        assert!(text.contains("unnamedmq_enqueue_total 10"));
        assert!(text.contains("unnamedmq_dequeue_total 4"));
        assert!(text.contains("unnamedmq_queue_depth 6"));

        // In-process readback is zero for the scrape-backed collector.
        assert_eq!(metrics.get_throughput(), (0, 0));
        assert_eq!(metrics.get_queue_depth(), 0);
    }

    #[test]
    fn prometheus_throughput_gauges_follow_sample_ticks() {
        let metrics = PrometheusMetrics::new().unwrap();
        for _ in 0..10 {
            metrics.inc_enqueue();
        }
        for _ in 0..4 {
            metrics.inc_dequeue();
        }

        metrics.sample();
        let text = metrics.encode_text();
        assert!(text.contains("unnamedmq_enqueue_throughput 10"));
        assert!(text.contains("unnamedmq_dequeue_throughput 4"));

        // An idle interval drives both gauges back to zero.
        metrics.sample();
        let text = metrics.encode_text();
        assert!(text.contains("unnamedmq_enqueue_throughput 0"));
        assert!(text.contains("unnamedmq_dequeue_throughput 0"));
    }

    #[test]
    fn prometheus_latency_histogram_uses_exponential_buckets() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.observe_enqueue_latency(Duration::from_micros(150));

        let text = metrics.encode_text();
        assert!(text.contains("unnamedmq_enqueue_latency_seconds_bucket{le=\"0.0001\"} 0"));
        assert!(text.contains("unnamedmq_enqueue_latency_seconds_bucket{le=\"0.0002\"} 1"));
        assert!(text.contains("unnamedmq_enqueue_latency_seconds_count 1"));
    }

    #[test]
    fn instrumented_queue_records_only_successes() {
        let metrics = Arc::new(DefaultMetrics::new());
        let queue = InstrumentedQueue::new(
            Arc::new(RingQueue::new(1)),
            Arc::clone(&metrics) as Arc<dyn MetricsCollector>,
        );

        queue.enqueue(Bytes::from_static(b"a")).unwrap();
        assert_eq!(metrics.get_throughput().0, 1);
        assert_eq!(metrics.get_queue_depth(), 1);

        // A refused enqueue records nothing.
        assert!(queue.enqueue(Bytes::from_static(b"b")).is_err());
        assert_eq!(metrics.get_throughput().0, 1);
        assert_eq!(metrics.get_queue_depth(), 1);

        queue.dequeue().unwrap();
        assert_eq!(metrics.get_throughput().1, 1);
        assert_eq!(metrics.get_queue_depth(), 0);

        // A refused dequeue records nothing.
        assert!(queue.dequeue().is_err());
        assert_eq!(metrics.get_throughput().1, 1);
    }

    #[test]
    fn instrumented_enqueue_feeds_the_latency_histogram() {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let queue = InstrumentedQueue::new(
            Arc::new(RingQueue::new(4)),
            Arc::clone(&metrics) as Arc<dyn MetricsCollector>,
        );

        queue.enqueue(Bytes::from_static(b"a")).unwrap();
        let text = metrics.encode_text();
        assert!(text.contains("unnamedmq_enqueue_latency_seconds_count 1"));
    }

    #[tokio::test]
    async fn sampler_stops_on_shutdown_signal() {
        let metrics: Arc<dyn MetricsCollector> = Arc::new(DefaultMetrics::new());
        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = spawn_throughput_sampler(metrics, shutdown_tx.subscribe());
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
