//! monodelta - cumulative counter to delta translation.
//!
//! Backends that expect "count since last report" cannot consume running
//! totals directly. monodelta keeps the last reading of every series and
//! turns each new cumulative reading into a delta, tolerating out-of-order
//! delivery and counter resets.
//!
//! # Architecture
//!
//! - `metrics`: series keys, previous-value store, translator, batch routing
//! - `receiver`: OTLP/gRPC metrics ingestion
//! - `export`: downstream sink for translated batches
//! - `core`: errors and configuration
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```
//! use monodelta::metrics::{
//!     DataPoint, MonotonicTranslator, NumberValue, PreviousValueStore, TagSet, Timestamp,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(PreviousValueStore::new(Duration::from_secs(3600), Duration::from_secs(1800)));
//! let translator = MonotonicTranslator::new(store);
//!
//! let tags = TagSet::new().with("host", "web-1");
//! let batch = vec![
//!     DataPoint::new(Timestamp::from_secs(0), NumberValue::Int(10), tags.clone()),
//!     DataPoint::new(Timestamp::from_secs(1), NumberValue::Int(15), tags),
//! ];
//!
//! let deltas = translator.translate("http.requests", &batch);
//! assert_eq!(deltas.len(), 1);
//! assert_eq!(deltas[0].value, NumberValue::Int(5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod export;
pub mod metrics;
pub mod receiver;

// Re-export core types for convenience
pub use crate::core::{Config, DeltaError, Result};
