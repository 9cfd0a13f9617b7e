//! Canonical identity of a time series.

use crate::metrics::types::TagSet;
use std::fmt;

const ENTRY_SEPARATOR: char = '\u{0}';
const KEY_VALUE_SEPARATOR: char = '\u{1f}';

/// Metric name plus canonicalized tag set, encoded as one opaque string.
///
/// Two keys are equal iff the name and the tag set contents are equal,
/// whatever order the tags were attached in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Encodes `name` and `tags` into a key.
    ///
    /// Tags are sorted by key, then value, before concatenation.
    pub fn encode(name: &str, tags: &TagSet) -> Self {
        let sorted = tags.sorted();
        let capacity = name.len()
            + sorted
                .iter()
                .map(|t| t.key.len() + t.value.len() + 2)
                .sum::<usize>();

        let mut key = String::with_capacity(capacity);
        key.push_str(name);
        for tag in sorted {
            key.push(ENTRY_SEPARATOR);
            key.push_str(&tag.key);
            key.push(KEY_VALUE_SEPARATOR);
            key.push_str(&tag.value);
        }
        SeriesKey(key)
    }

    /// Returns the encoded form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // separators are control characters, print them readably
        let readable: String = self
            .0
            .chars()
            .map(|c| match c {
                ENTRY_SEPARATOR => ',',
                KEY_VALUE_SEPARATOR => ':',
                other => other,
            })
            .collect();
        f.write_str(&readable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_order_is_irrelevant() {
        let name = "metric.name";
        let no_tags = SeriesKey::encode(name, &TagSet::new());
        let some_tags =
            SeriesKey::encode(name, &TagSet::new().with("key1", "val1").with("key2", "val2"));
        let same_tags =
            SeriesKey::encode(name, &TagSet::new().with("key2", "val2").with("key1", "val1"));
        let diff_tags = SeriesKey::encode(name, &TagSet::new().with("key3", "val3"));

        assert_ne!(no_tags, some_tags);
        assert_ne!(some_tags, diff_tags);
        assert_eq!(some_tags, same_tags);
    }

    #[test]
    fn test_name_participates() {
        let tags = TagSet::new().with("host", "a");
        assert_ne!(SeriesKey::encode("x", &tags), SeriesKey::encode("y", &tags));
    }

    #[test]
    fn test_separators_prevent_collisions() {
        // name/tag and key/value boundaries must survive concatenation
        let first = SeriesKey::encode("a", &TagSet::new().with("b", "c"));
        let second = SeriesKey::encode("ab", &TagSet::new().with("", "c"));
        assert_ne!(first, second);

        let split_left = SeriesKey::encode("m", &TagSet::new().with("k:x", "v"));
        let split_right = SeriesKey::encode("m", &TagSet::new().with("k", "x:v"));
        assert_ne!(split_left, split_right);
    }

    #[test]
    fn test_empty_tag_set_is_distinct() {
        let empty = SeriesKey::encode("requests", &TagSet::new());
        let empty_value = SeriesKey::encode("requests", &TagSet::new().with("", ""));
        assert_eq!(empty.as_str(), "requests");
        assert_ne!(empty, empty_value);
    }

    #[test]
    fn test_display_is_readable() {
        let key = SeriesKey::encode("requests", &TagSet::new().with("b", "2").with("a", "1"));
        assert_eq!(key.to_string(), "requests,a:1,b:2");
    }
}
