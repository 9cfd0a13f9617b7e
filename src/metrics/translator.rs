//! Reset-aware conversion of cumulative monotonic readings into deltas.
//!
//! Points of one call are grouped by series, sorted by time, and walked
//! pairwise starting from the baseline held in the [`PreviousValueStore`].
//! A decrease between two consecutive readings is a counter reset: the pair
//! emits nothing and the lower value becomes the next baseline.

use crate::core::Result;
use crate::metrics::series_key::SeriesKey;
use crate::metrics::store::PreviousValueStore;
use crate::metrics::types::{DataPoint, DeltaPoint, NumberValue, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of translating one metric's points
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Translation {
    /// Emitted deltas, grouped by series
    pub points: Vec<DeltaPoint>,
    /// Points dropped because their value was unusable
    pub skipped: usize,
    /// Points older than the stored baseline
    pub stale: usize,
    /// Pairs suppressed as counter resets
    pub resets: usize,
    /// Series whose baseline could not be stored; their deltas are dropped
    pub failed_groups: usize,
}

#[derive(Debug, Default)]
struct GroupTranslation {
    points: Vec<DeltaPoint>,
    stale: usize,
    resets: usize,
}

/// Stateless translator over a shared previous-value store.
#[derive(Debug, Clone)]
pub struct MonotonicTranslator {
    store: Arc<PreviousValueStore>,
}

impl MonotonicTranslator {
    /// Creates a translator that reads and updates `store`
    pub fn new(store: Arc<PreviousValueStore>) -> Self {
        Self { store }
    }

    /// Converts the cumulative readings of `metric_name` into deltas.
    pub fn translate(&self, metric_name: &str, batch: &[DataPoint]) -> Vec<DeltaPoint> {
        self.translate_detailed(metric_name, batch).points
    }

    /// Like [`translate`](Self::translate), also reporting what was dropped.
    pub fn translate_detailed(&self, metric_name: &str, batch: &[DataPoint]) -> Translation {
        let mut translation = Translation::default();

        let mut index: HashMap<SeriesKey, usize> = HashMap::new();
        let mut groups: Vec<(SeriesKey, Vec<&DataPoint>)> = Vec::new();

        for point in batch {
            if !point.value.is_usable() {
                tracing::debug!(
                    metric = metric_name,
                    timestamp = %point.timestamp,
                    "Skipping point without a usable value"
                );
                translation.skipped += 1;
                continue;
            }

            let key = SeriesKey::encode(metric_name, &point.tags);
            match index.get(&key) {
                Some(&i) => groups[i].1.push(point),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, vec![point]));
                },
            }
        }

        for (key, mut points) in groups {
            // stable: equal timestamps keep arrival order
            points.sort_by_key(|p| p.timestamp);

            match self.translate_group(&key, &points) {
                Ok(group) => {
                    translation.points.extend(group.points);
                    translation.stale += group.stale;
                    translation.resets += group.resets;
                },
                Err(e) => {
                    tracing::warn!(
                        series = %key,
                        error = %e,
                        category = e.category(),
                        "Dropping series deltas, previous value could not be stored"
                    );
                    translation.failed_groups += 1;
                },
            }
        }

        translation
    }

    /// Walks one time-sorted series. Either every delta of the group is
    /// returned or, if the store refuses an update, none.
    fn translate_group(&self, key: &SeriesKey, points: &[&DataPoint]) -> Result<GroupTranslation> {
        let mut group = GroupTranslation::default();
        let mut baseline: Option<(Timestamp, NumberValue)> =
            self.store.get(key).map(|record| (record.timestamp, record.value));

        for point in points {
            if let Some((prev_ts, prev_value)) = baseline {
                if point.timestamp < prev_ts {
                    tracing::debug!(
                        series = %key,
                        timestamp = %point.timestamp,
                        baseline = %prev_ts,
                        "Dropping point older than stored baseline"
                    );
                    group.stale += 1;
                    continue;
                }

                match point.value.delta_since(prev_value) {
                    Some(delta) => group.points.push(DeltaPoint {
                        timestamp: point.timestamp,
                        value: delta,
                        tags: point.tags.clone(),
                    }),
                    None => {
                        tracing::debug!(
                            series = %key,
                            current = %point.value,
                            previous = %prev_value,
                            "Counter reset detected"
                        );
                        group.resets += 1;
                    },
                }
            }

            self.store.put(key, point.timestamp, point.value)?;
            baseline = Some((point.timestamp, point.value));
        }

        Ok(group)
    }
}
