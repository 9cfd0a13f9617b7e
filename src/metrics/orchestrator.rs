//! Routes the metrics of an inbound batch by shape.
//!
//! Cumulative monotonic sums go through the [`MonotonicTranslator`]; every
//! other supported shape is handed back untouched for downstream
//! formatting.

use crate::core::config::TranslatorConfig;
use crate::metrics::store::PreviousValueStore;
use crate::metrics::translator::MonotonicTranslator;
use crate::metrics::types::{DeltaPoint, Metric, MetricData, Temporality};
use std::sync::Arc;

/// Deltas emitted for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSeries {
    /// Metric name
    pub name: String,
    /// Emitted points
    pub points: Vec<DeltaPoint>,
}

/// Result of processing one inbound batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchOutput {
    /// Deltas computed from cumulative monotonic sums
    pub deltas: Vec<DeltaSeries>,
    /// Metrics forwarded unchanged
    pub passthrough: Vec<Metric>,
    /// Metrics dropped because their shape or temporality is unsupported
    pub dropped: usize,
    /// Points skipped inside translated metrics
    pub skipped_points: usize,
    /// Series whose deltas were dropped on a store failure
    pub failed_groups: usize,
}

impl BatchOutput {
    /// Total number of emitted delta points
    pub fn delta_count(&self) -> usize {
        self.deltas.iter().map(|d| d.points.len()).sum()
    }

    /// True when nothing is left to export
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.passthrough.is_empty()
    }
}

/// Batch-level entry point over a shared previous-value store
#[derive(Debug, Clone)]
pub struct BatchTranslator {
    translator: MonotonicTranslator,
    send_monotonic: bool,
}

impl BatchTranslator {
    /// Creates a batch translator
    pub fn new(store: Arc<PreviousValueStore>, config: &TranslatorConfig) -> Self {
        Self {
            translator: MonotonicTranslator::new(store),
            send_monotonic: config.send_monotonic,
        }
    }

    /// Processes every metric of `metrics`
    pub fn process(&self, metrics: Vec<Metric>) -> BatchOutput {
        let mut output = BatchOutput::default();

        for metric in metrics {
            match &metric.data {
                MetricData::Empty => {
                    tracing::warn!(metric = %metric.name, "Unknown or unsupported metric type");
                    output.dropped += 1;
                },
                MetricData::Sum {
                    temporality: Temporality::Unspecified,
                    ..
                } => {
                    tracing::warn!(
                        metric = %metric.name,
                        "Unknown or unsupported aggregation temporality"
                    );
                    output.dropped += 1;
                },
                MetricData::Sum { points, .. }
                    if self.send_monotonic && metric.is_cumulative_monotonic() =>
                {
                    let translation = self.translator.translate_detailed(&metric.name, points);
                    output.skipped_points += translation.skipped;
                    output.failed_groups += translation.failed_groups;
                    if !translation.points.is_empty() {
                        output.deltas.push(DeltaSeries {
                            name: metric.name,
                            points: translation.points,
                        });
                    }
                },
                _ => output.passthrough.push(metric),
            }
        }

        output
    }
}
