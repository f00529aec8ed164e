//! End-to-end unary RPC scenarios over the instrumented queue.

use pulsemq::proto::message_queue_server::MessageQueue;
use pulsemq::proto::{ConsumeRequest, ProduceRequest};
use pulsemq::{
    DefaultMetrics, InstrumentedQueue, MetricsCollector, PrometheusMetrics, Queue, RingQueue,
    StreamingQueueService, UnaryQueueService,
};
use std::sync::Arc;
use tonic::Request;

fn instrumented(capacity: u64, metrics: Arc<dyn MetricsCollector>) -> Arc<dyn Queue> {
    Arc::new(InstrumentedQueue::new(
        Arc::new(RingQueue::new(capacity)),
        metrics,
    ))
}

#[tokio::test]
async fn produce_then_consume_roundtrips() {
    let queue = instrumented(16, Arc::new(DefaultMetrics::new()));
    let service = UnaryQueueService::new(queue);

    let reply = service
        .produce(Request::new(ProduceRequest {
            payload: vec![0x68, 0x65, 0x6c, 0x6c, 0x6f],
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success);
    assert_eq!(reply.error, "");

    let reply = service
        .consume(Request::new(ConsumeRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.payload, vec![0x68, 0x65, 0x6c, 0x6c, 0x6f]);
    assert_eq!(reply.error, "");
}

#[tokio::test]
async fn consume_on_fresh_queue_reports_empty_in_band() {
    let queue = instrumented(16, Arc::new(DefaultMetrics::new()));
    let service = UnaryQueueService::new(queue);

    // The RPC status is OK; the condition travels in the error field.
    let reply = service
        .consume(Request::new(ConsumeRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert!(reply.payload.is_empty());
    assert_eq!(reply.error, "queue is empty");
}

#[tokio::test]
async fn produce_overflow_reports_full_in_band() {
    let queue = instrumented(3, Arc::new(DefaultMetrics::new()));
    let service = UnaryQueueService::new(queue);

    for payload in [b"A", b"B", b"C"] {
        let reply = service
            .produce(Request::new(ProduceRequest {
                payload: payload.to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.success);
        assert_eq!(reply.error, "");
    }

    let reply = service
        .produce(Request::new(ProduceRequest {
            payload: b"D".to_vec(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(!reply.success);
    assert_eq!(reply.error, "queue is full");
}

#[tokio::test]
async fn zero_length_payload_roundtrips_with_empty_error() {
    let queue = instrumented(4, Arc::new(DefaultMetrics::new()));
    let service = UnaryQueueService::new(queue);

    let reply = service
        .produce(Request::new(ProduceRequest { payload: vec![] }))
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success);

    // A dequeued zero-length payload is distinguishable from Empty by the
    // error field alone.
    let reply = service
        .consume(Request::new(ConsumeRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert!(reply.payload.is_empty());
    assert_eq!(reply.error, "");
}

#[tokio::test]
async fn streaming_service_rejects_unary_methods() {
    let queue = instrumented(4, Arc::new(DefaultMetrics::new()));
    let service = StreamingQueueService::new(queue);

    let status = service
        .produce(Request::new(ProduceRequest {
            payload: b"x".to_vec(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);

    let status = service
        .consume(Request::new(ConsumeRequest {}))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);
}

#[tokio::test]
async fn scrape_reflects_unary_traffic() {
    let metrics = Arc::new(PrometheusMetrics::new().unwrap());
    let queue = instrumented(64, Arc::clone(&metrics) as Arc<dyn MetricsCollector>);
    let service = UnaryQueueService::new(queue);

    for i in 0u8..10 {
        let reply = service
            .produce(Request::new(ProduceRequest { payload: vec![i] }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.success);
    }
    for _ in 0..4 {
        let reply = service
            .consume(Request::new(ConsumeRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.error, "");
    }

    let text = metrics.encode_text();
    assert!(text.contains("unnamedmq_enqueue_total 10"));
    assert!(text.contains("unnamedmq_dequeue_total 4"));
    assert!(text.contains("unnamedmq_queue_depth 6"));
    assert!(text.contains("unnamedmq_enqueue_latency_seconds_count 10"));
}
