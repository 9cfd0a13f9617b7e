//! Common test utilities and fixtures.

#![allow(dead_code)]

use monodelta::metrics::{DataPoint, DeltaPoint, NumberValue, PreviousValueStore, TagSet, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// Store with production-like eviction settings.
pub fn new_store() -> Arc<PreviousValueStore> {
    Arc::new(PreviousValueStore::new(
        Duration::from_secs(3600),
        Duration::from_secs(1800),
    ))
}

pub fn seconds(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

/// Builds Int points pairing `stamps[i]` (seconds) with `values[i]`.
pub fn int_points(stamps: &[u64], values: &[i64], tags: &TagSet) -> Vec<DataPoint> {
    assert_eq!(stamps.len(), values.len());
    stamps
        .iter()
        .zip(values)
        .map(|(&ts, &v)| DataPoint::new(seconds(ts), NumberValue::Int(v), tags.clone()))
        .collect()
}

pub fn double_points(stamps: &[u64], values: &[f64], tags: &TagSet) -> Vec<DataPoint> {
    assert_eq!(stamps.len(), values.len());
    stamps
        .iter()
        .zip(values)
        .map(|(&ts, &v)| DataPoint::new(seconds(ts), NumberValue::Double(v), tags.clone()))
        .collect()
}

pub fn delta(secs: u64, value: NumberValue, tags: &TagSet) -> DeltaPoint {
    DeltaPoint {
        timestamp: seconds(secs),
        value,
        tags: tags.clone(),
    }
}
