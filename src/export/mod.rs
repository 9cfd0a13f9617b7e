//! Downstream sink for translated batches.
//!
//! Vendor-specific serialization and submission live outside this crate;
//! the log exporter here renders every emitted delta through `tracing` so
//! the pipeline is observable when run standalone.

use crate::metrics::{BatchOutput, DeltaSeries};
use tokio::sync::mpsc;

/// Running totals of what the exporter has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Batches received
    pub batches: u64,
    /// Delta points logged
    pub deltas: u64,
    /// Metrics forwarded unchanged
    pub passthrough: u64,
}

/// Logs each delta point at `info` level
#[derive(Debug, Default)]
pub struct LogExporter {
    stats: ExportStats,
}

impl LogExporter {
    /// Create a new log exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch
    pub fn export(&mut self, batch: &BatchOutput) {
        self.stats.batches += 1;
        for series in &batch.deltas {
            self.export_series(series);
        }
        for metric in &batch.passthrough {
            tracing::debug!(metric = %metric.name, "Forwarding metric unchanged");
        }
        self.stats.passthrough += batch.passthrough.len() as u64;
    }

    fn export_series(&mut self, series: &DeltaSeries) {
        for point in &series.points {
            let tags: Vec<String> = point
                .tags
                .sorted()
                .into_iter()
                .map(|t| format!("{}:{}", t.key, t.value))
                .collect();
            tracing::info!(
                metric = %series.name,
                timestamp = %point.timestamp,
                value = %point.value,
                tags = %tags.join(","),
                "count"
            );
        }
        self.stats.deltas += series.points.len() as u64;
    }

    /// Drain `rx` until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::Receiver<BatchOutput>) -> ExportStats {
        while let Some(batch) = rx.recv().await {
            self.export(&batch);
        }
        tracing::info!(
            batches = self.stats.batches,
            deltas = self.stats.deltas,
            "Log exporter finished"
        );
        self.stats
    }

    /// Current totals
    pub fn stats(&self) -> ExportStats {
        self.stats
    }
}
