//! Cumulative-to-delta metric translation.
//!
//! Leaves first:
//! - `series_key`: canonical identity of a time series
//! - `store`: time-bounded previous-value cache with background eviction
//! - `translator`: reset-aware monotonic delta algorithm
//! - `orchestrator`: per-batch routing by metric shape

pub mod orchestrator;
pub mod series_key;
pub mod store;
pub mod translator;
pub mod types;

pub use orchestrator::{BatchOutput, BatchTranslator, DeltaSeries};
pub use series_key::SeriesKey;
pub use store::{PreviousPointRecord, PreviousValueStore, StoreStats, Sweeper};
pub use translator::{MonotonicTranslator, Translation};
pub use types::{
    DataPoint, DeltaPoint, HistogramPoint, Metric, MetricData, NumberValue, SummaryPoint, Tag,
    TagSet, Temporality, Timestamp,
};
