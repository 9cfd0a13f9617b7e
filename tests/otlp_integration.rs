//! OTLP Protocol Integration Tests
//!
//! Drives the gRPC metrics receiver end to end: export requests go in over
//! a real connection and translated batches come out of the exporter
//! channel.

use monodelta::core::config::TranslatorConfig;
use monodelta::metrics::{BatchOutput, BatchTranslator, NumberValue, PreviousValueStore, Timestamp};
use monodelta::receiver::{self, DeltaMetricsReceiver};
use opentelemetry_proto::tonic::{
    collector::metrics::v1::{
        metrics_service_client::MetricsServiceClient, ExportMetricsServiceRequest,
    },
    common::v1::{any_value::Value, AnyValue, KeyValue},
    metrics::v1::{
        metric::Data, number_data_point, AggregationTemporality, Gauge, Metric, NumberDataPoint,
        ResourceMetrics, ScopeMetrics, Sum,
    },
    resource::v1::Resource,
};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

mod common;
use common::new_store;

fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

fn point(ts_secs: u64, value: i64, attributes: Vec<KeyValue>) -> NumberDataPoint {
    NumberDataPoint {
        attributes,
        start_time_unix_nano: 0,
        time_unix_nano: ts_secs * 1_000_000_000,
        value: Some(number_data_point::Value::AsInt(value)),
        exemplars: vec![],
        flags: 0,
    }
}

fn sum(name: &str, temporality: AggregationTemporality, points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        description: String::new(),
        unit: "1".to_string(),
        metadata: vec![],
        data: Some(Data::Sum(Sum {
            data_points: points,
            aggregation_temporality: temporality as i32,
            is_monotonic: true,
        })),
    }
}

fn request(host: &str, metrics: Vec<Metric>) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(Resource {
                attributes: vec![kv("host.name", host)],
                dropped_attributes_count: 0,
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }],
    }
}

fn pipeline(store: Arc<PreviousValueStore>) -> (DeltaMetricsReceiver, mpsc::Receiver<BatchOutput>) {
    let translator = Arc::new(BatchTranslator::new(store, &TranslatorConfig::default()));
    let (tx, rx) = mpsc::channel(16);
    (DeltaMetricsReceiver::new(translator, tx, true), rx)
}

fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn connect(addr: SocketAddr) -> MetricsServiceClient<tonic::transport::Channel> {
    let endpoint = format!("http://{}", addr);
    for _ in 0..50 {
        if let Ok(client) = MetricsServiceClient::connect(endpoint.clone()).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("receiver did not come up on {}", addr);
}

/// Test cumulative counters arriving over gRPC come out as deltas
#[tokio::test]
async fn test_grpc_export_translates_counters() {
    let (receiver, mut rx) = pipeline(new_store());
    let addr = free_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(receiver::serve(receiver, addr, async move {
        let _ = stop_rx.await;
    }));

    let mut client = connect(addr).await;
    let first = client
        .export(request(
            "web-1",
            vec![sum(
                "http.requests",
                AggregationTemporality::Cumulative,
                vec![point(10, 100, vec![kv("route", "/")])],
            )],
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(first.partial_success.is_none());

    client
        .export(request(
            "web-1",
            vec![sum(
                "http.requests",
                AggregationTemporality::Cumulative,
                vec![point(20, 130, vec![kv("route", "/")])],
            )],
        ))
        .await
        .unwrap();

    // first observation produces nothing, so the only batch is the delta
    let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.deltas.len(), 1);
    let delta = &batch.deltas[0].points[0];
    assert_eq!(delta.value, NumberValue::Int(30));
    assert_eq!(delta.timestamp, Timestamp::from_secs(20));
    assert_eq!(delta.tags.get("host.name"), Some("web-1"));
    assert_eq!(delta.tags.get("route"), Some("/"));

    drop(client);
    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

/// Test gauges and delta sums are forwarded untouched
#[tokio::test]
async fn test_passthrough_shapes() {
    let (receiver, mut rx) = pipeline(new_store());

    let gauge = Metric {
        name: "memory.used".to_string(),
        description: String::new(),
        unit: "By".to_string(),
        metadata: vec![],
        data: Some(Data::Gauge(Gauge {
            data_points: vec![point(1, 512, vec![])],
        })),
    };
    let delta_sum = sum("bytes.sent", AggregationTemporality::Delta, vec![point(1, 5, vec![])]);

    let rejected = receiver
        .handle(request("db-1", vec![gauge, delta_sum]))
        .await
        .unwrap();
    assert_eq!(rejected, 0);

    let batch = rx.recv().await.unwrap();
    assert!(batch.deltas.is_empty());
    let names: Vec<_> = batch.passthrough.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["memory.used", "bytes.sent"]);
}

/// Test one host restarting does not disturb another host's series
#[tokio::test]
async fn test_hosts_are_independent_series() {
    let (receiver, mut rx) = pipeline(new_store());
    let counter = |ts, v| {
        vec![sum(
            "jobs.done",
            AggregationTemporality::Cumulative,
            vec![point(ts, v, vec![])],
        )]
    };

    receiver.handle(request("a", counter(0, 50))).await.unwrap();
    receiver.handle(request("b", counter(0, 7))).await.unwrap();
    // host a restarted
    receiver.handle(request("a", counter(1, 2))).await.unwrap();
    receiver.handle(request("b", counter(1, 9))).await.unwrap();
    receiver.handle(request("a", counter(2, 6))).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.deltas[0].points[0].tags.get("host.name"), Some("b"));
    assert_eq!(first.deltas[0].points[0].value, NumberValue::Int(2));

    let second = rx.recv().await.unwrap();
    assert_eq!(second.deltas[0].points[0].tags.get("host.name"), Some("a"));
    assert_eq!(second.deltas[0].points[0].value, NumberValue::Int(4));
}

/// Test a full store rejects new series without failing the request
#[tokio::test]
async fn test_store_full_drops_new_series() {
    let store = Arc::new(
        PreviousValueStore::new(Duration::from_secs(3600), Duration::from_secs(1800))
            .with_max_series(1),
    );
    let (receiver, mut rx) = pipeline(Arc::clone(&store));
    let counter = |name: &str, ts, v| {
        vec![sum(name, AggregationTemporality::Cumulative, vec![point(ts, v, vec![])])]
    };

    receiver.handle(request("a", counter("kept", 0, 1))).await.unwrap();
    receiver.handle(request("a", counter("refused", 0, 1))).await.unwrap();
    receiver.handle(request("a", counter("refused", 1, 4))).await.unwrap();
    receiver.handle(request("a", counter("kept", 1, 3))).await.unwrap();

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.deltas.len(), 1);
    assert_eq!(batch.deltas[0].name, "kept");
    assert_eq!(store.len(), 1);
    assert!(store.stats().rejected >= 2);
}
