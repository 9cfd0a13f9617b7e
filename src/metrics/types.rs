//! In-memory metric model consumed and produced by the translator.
//!
//! These types are already free of any wire format; the receiver decodes
//! OTLP into them and downstream exporters consume them.

use std::fmt;

/// Point timestamp in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from Unix nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    /// Creates a timestamp from whole Unix seconds
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the Unix nanoseconds
    pub const fn as_nanos(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric value of a data point. Integer and floating input keep their kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    /// 64-bit signed integer
    Int(i64),
    /// IEEE-754 double
    Double(f64),
}

impl NumberValue {
    /// Lossy view as f64
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            NumberValue::Int(v) => v as f64,
            NumberValue::Double(v) => v,
        }
    }

    /// Whether the value can take part in a delta computation
    pub fn is_usable(self) -> bool {
        match self {
            NumberValue::Int(_) => true,
            NumberValue::Double(v) => !v.is_nan(),
        }
    }

    /// `self - previous`, or `None` when the pair is a counter reset.
    ///
    /// Integer pairs stay integer; any pair involving a double is computed
    /// as a double. An integer difference beyond `i64::MAX` falls back to
    /// a double as well.
    pub fn delta_since(self, previous: NumberValue) -> Option<NumberValue> {
        match (self, previous) {
            (NumberValue::Int(cur), NumberValue::Int(prev)) => {
                if cur < prev {
                    return None;
                }
                Some(
                    cur.checked_sub(prev)
                        .map(NumberValue::Int)
                        .unwrap_or_else(|| NumberValue::Double(self.as_f64() - previous.as_f64())),
                )
            },
            (cur, prev) => {
                let delta = cur.as_f64() - prev.as_f64();
                if delta >= 0.0 {
                    Some(NumberValue::Double(delta))
                } else {
                    None
                }
            },
        }
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberValue::Int(v) => write!(f, "{}", v),
            NumberValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// A single `key=value` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

/// Set of tags attached to a point. Keys are unique, presentation order is
/// kept as given and carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Creates an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag, replacing the value of an existing key
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|t| t.key == key) {
            Some(existing) => existing.value = value,
            None => self.tags.push(Tag { key, value }),
        }
    }

    /// Builder-style insert
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when no tags are set
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags in presentation order
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Tags sorted by key, then value
    pub fn sorted(&self) -> Vec<&Tag> {
        let mut sorted: Vec<&Tag> = self.tags.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));
        sorted
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.sorted() == other.sorted()
    }
}

impl Eq for TagSet {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Raw cumulative reading of one series
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Observation time
    pub timestamp: Timestamp,
    /// Cumulative value
    pub value: NumberValue,
    /// Series tags
    pub tags: TagSet,
}

impl DataPoint {
    /// Creates a new data point
    pub fn new(timestamp: Timestamp, value: NumberValue, tags: TagSet) -> Self {
        Self {
            timestamp,
            value,
            tags,
        }
    }
}

/// Count since the previous report of the same series
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPoint {
    /// Timestamp of the later of the two points
    pub timestamp: Timestamp,
    /// `current - previous`
    pub value: NumberValue,
    /// Tags of the input point
    pub tags: TagSet,
}

/// Aggregation temporality of a sum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporality {
    /// Not set by the producer
    Unspecified,
    /// Each point covers only its own interval
    Delta,
    /// Each point is a running total
    Cumulative,
}

/// Histogram data point, passed through untouched
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPoint {
    /// End of the observation window
    pub timestamp: Timestamp,
    /// Number of observations
    pub count: u64,
    /// Sum of observations, when reported
    pub sum: Option<f64>,
    /// Per-bucket counts
    pub bucket_counts: Vec<u64>,
    /// Upper bounds separating the buckets
    pub explicit_bounds: Vec<f64>,
    /// Point tags
    pub tags: TagSet,
}

/// Summary data point, passed through untouched
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPoint {
    /// End of the observation window
    pub timestamp: Timestamp,
    /// Number of observations
    pub count: u64,
    /// Sum of observations
    pub sum: f64,
    /// `(quantile, value)` pairs
    pub quantiles: Vec<(f64, f64)>,
    /// Point tags
    pub tags: TagSet,
}

/// Shape-specific payload of a metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricData {
    /// Producer sent no data
    Empty,
    /// Point-in-time values
    Gauge(Vec<DataPoint>),
    /// Sums with temporality and monotonicity
    Sum {
        /// Readings
        points: Vec<DataPoint>,
        /// How readings relate to each other in time
        temporality: Temporality,
        /// Whether the sum only ever grows
        is_monotonic: bool,
    },
    /// Bucketed distributions
    Histogram(Vec<HistogramPoint>),
    /// Pre-computed quantiles
    Summary(Vec<SummaryPoint>),
}

/// One named metric of an inbound batch
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name
    pub name: String,
    /// Shape and points
    pub data: MetricData,
}

impl Metric {
    /// Creates a new metric
    pub fn new<S: Into<String>>(name: S, data: MetricData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// True for sums that report a monotonic running total
    pub fn is_cumulative_monotonic(&self) -> bool {
        matches!(
            self.data,
            MetricData::Sum {
                temporality: Temporality::Cumulative,
                is_monotonic: true,
                ..
            }
        )
    }
}
