//! OTLP Metrics receiver implementation.
//!
//! Decodes `ExportMetricsServiceRequest` into the in-memory metric model,
//! runs the batch translator, and forwards the result downstream.

use crate::core::DeltaError;
use crate::metrics::{
    BatchOutput, BatchTranslator, DataPoint, HistogramPoint, Metric, MetricData, NumberValue,
    SummaryPoint, TagSet, Temporality, Timestamp,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsPartialSuccess, ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, AggregationTemporality, NumberDataPoint,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status};

/// Rendering of an empty attribute value
const EMPTY_TAG_VALUE: &str = "n/a";

/// Create a metrics service server for GRPC
pub fn create_metrics_service_server(
    receiver: DeltaMetricsReceiver,
) -> MetricsServiceServer<DeltaMetricsReceiver> {
    MetricsServiceServer::new(receiver)
}

/// OTLP metrics receiver feeding the delta translator
#[derive(Debug, Clone)]
pub struct DeltaMetricsReceiver {
    translator: Arc<BatchTranslator>,
    output: mpsc::Sender<BatchOutput>,
    resource_attributes_as_tags: bool,
}

/// Decoded request plus the number of points that could not be decoded
#[derive(Debug, Default)]
pub struct DecodedBatch {
    /// Converted metrics, in request order
    pub metrics: Vec<Metric>,
    /// Number points carrying neither an int nor a double value
    pub malformed_points: usize,
}

impl DeltaMetricsReceiver {
    /// Create new metrics receiver
    pub fn new(
        translator: Arc<BatchTranslator>,
        output: mpsc::Sender<BatchOutput>,
        resource_attributes_as_tags: bool,
    ) -> Self {
        Self {
            translator,
            output,
            resource_attributes_as_tags,
        }
    }

    /// Decode an export request into the in-memory model
    pub fn decode_request(&self, request: ExportMetricsServiceRequest) -> DecodedBatch {
        let mut decoded = DecodedBatch::default();

        for resource_metrics in request.resource_metrics {
            let resource_tags = match (&resource_metrics.resource, self.resource_attributes_as_tags)
            {
                (Some(resource), true) => tags_from_attributes(&resource.attributes, None),
                _ => TagSet::new(),
            };

            for scope_metrics in resource_metrics.scope_metrics {
                for metric in scope_metrics.metrics {
                    decoded.metrics.push(convert_otlp_metric(
                        metric,
                        &resource_tags,
                        &mut decoded.malformed_points,
                    ));
                }
            }
        }

        decoded
    }

    /// Decode, translate and forward one request. Returns the number of
    /// data points that were rejected.
    pub async fn handle(&self, request: ExportMetricsServiceRequest) -> Result<usize, Status> {
        let decoded = self.decode_request(request);
        let output = self.translator.process(decoded.metrics);

        let rejected = decoded.malformed_points + output.skipped_points;
        tracing::debug!(
            deltas = output.delta_count(),
            passthrough = output.passthrough.len(),
            dropped_metrics = output.dropped,
            rejected,
            "Translated metrics batch"
        );

        if !output.is_empty() {
            self.output
                .send(output)
                .await
                .map_err(|_| Status::from(DeltaError::ChannelSend))?;
        }

        Ok(rejected)
    }
}

#[tonic::async_trait]
impl MetricsService for DeltaMetricsReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        let rejected = self.handle(request.into_inner()).await?;

        let partial_success = (rejected > 0).then(|| ExportMetricsPartialSuccess {
            rejected_data_points: i64::try_from(rejected).unwrap_or(i64::MAX),
            error_message: format!("{} data points had no usable value", rejected),
        });

        Ok(Response::new(ExportMetricsServiceResponse { partial_success }))
    }
}

/// Convert OTLP metric to the in-memory model
fn convert_otlp_metric(
    metric: opentelemetry_proto::tonic::metrics::v1::Metric,
    resource_tags: &TagSet,
    malformed: &mut usize,
) -> Metric {
    let data = match metric.data {
        None | Some(Data::ExponentialHistogram(_)) => MetricData::Empty,
        Some(Data::Gauge(gauge)) => {
            MetricData::Gauge(convert_number_points(gauge.data_points, resource_tags, malformed))
        },
        Some(Data::Sum(sum)) => MetricData::Sum {
            points: convert_number_points(sum.data_points, resource_tags, malformed),
            temporality: convert_temporality(sum.aggregation_temporality),
            is_monotonic: sum.is_monotonic,
        },
        Some(Data::Histogram(histogram)) => MetricData::Histogram(
            histogram
                .data_points
                .into_iter()
                .map(|p| HistogramPoint {
                    timestamp: Timestamp::from_nanos(p.time_unix_nano),
                    count: p.count,
                    sum: p.sum,
                    bucket_counts: p.bucket_counts,
                    explicit_bounds: p.explicit_bounds,
                    tags: tags_from_attributes(&p.attributes, Some(resource_tags)),
                })
                .collect(),
        ),
        Some(Data::Summary(summary)) => MetricData::Summary(
            summary
                .data_points
                .into_iter()
                .map(|p| SummaryPoint {
                    timestamp: Timestamp::from_nanos(p.time_unix_nano),
                    count: p.count,
                    sum: p.sum,
                    quantiles: p
                        .quantile_values
                        .iter()
                        .map(|q| (q.quantile, q.value))
                        .collect(),
                    tags: tags_from_attributes(&p.attributes, Some(resource_tags)),
                })
                .collect(),
        ),
    };

    Metric::new(metric.name, data)
}

fn convert_number_points(
    points: Vec<NumberDataPoint>,
    resource_tags: &TagSet,
    malformed: &mut usize,
) -> Vec<DataPoint> {
    let mut converted = Vec::with_capacity(points.len());
    for point in points {
        match extract_numeric_value(&point) {
            Ok(value) => converted.push(DataPoint::new(
                Timestamp::from_nanos(point.time_unix_nano),
                value,
                tags_from_attributes(&point.attributes, Some(resource_tags)),
            )),
            Err(e) => {
                tracing::debug!(timestamp = point.time_unix_nano, error = %e, "Skipping point");
                *malformed += 1;
            },
        }
    }
    converted
}

/// Extract numeric value from OTLP NumberDataPoint
fn extract_numeric_value(data_point: &NumberDataPoint) -> Result<NumberValue, DeltaError> {
    match data_point.value {
        Some(number_data_point::Value::AsDouble(v)) => Ok(NumberValue::Double(v)),
        Some(number_data_point::Value::AsInt(v)) => Ok(NumberValue::Int(v)),
        None => Err(DeltaError::invalid_point("number data point carries no value")),
    }
}

fn convert_temporality(raw: i32) -> Temporality {
    match AggregationTemporality::try_from(raw) {
        Ok(AggregationTemporality::Cumulative) => Temporality::Cumulative,
        Ok(AggregationTemporality::Delta) => Temporality::Delta,
        _ => Temporality::Unspecified,
    }
}

/// Build a tag set from attributes, on top of `base` when given.
/// Point attributes win over resource attributes with the same key.
fn tags_from_attributes(attributes: &[KeyValue], base: Option<&TagSet>) -> TagSet {
    let mut tags = base.cloned().unwrap_or_default();
    for attribute in attributes {
        let value = attribute
            .value
            .as_ref()
            .map(value_to_string)
            .unwrap_or_default();
        let value = if value.is_empty() {
            EMPTY_TAG_VALUE.to_string()
        } else {
            value
        };
        tags.insert(attribute.key.as_str(), value);
    }
    tags
}

/// Convert OTEL value to string.
fn value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => d.to_string(),
        Some(Value::ArrayValue(arr)) => {
            let values: Vec<String> = arr.values.iter().map(value_to_string).collect();
            format!("[{}]", values.join(","))
        },
        Some(Value::KvlistValue(kv)) => {
            let pairs: Vec<String> = kv
                .values
                .iter()
                .map(|kv| {
                    let value = kv.value.as_ref().map(value_to_string).unwrap_or_default();
                    format!("{}={}", kv.key, value)
                })
                .collect();
            format!("{{{}}}", pairs.join(","))
        },
        Some(Value::BytesValue(bytes)) => hex::encode(bytes),
        None => String::new(),
    }
}
