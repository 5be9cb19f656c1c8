use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

/// The ordered tag list of a [`MetricId`].
pub type Tags = SmallVec<[(String, String); 4]>;

/// The identity of a meter: a dot-delimited name and an ordered list of tags.
///
/// Tags keep their declaration order. Keys are unique; adding a tag with an existing key replaces
/// its value in place.
///
/// # Example
///
/// ```
/// use tally_statsd::MetricId;
///
/// let id = MetricId::new("http.requests")
///     .with_tag("method", "GET")
///     .with_tag("status", "200");
///
/// assert_eq!(id.to_string(), "http.requests{method=GET,status=200}");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    name: String,
    tags: Tags,
}

impl MetricId {
    /// Creates an identity without tags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
        }
    }

    /// Adds a tag, replacing the value of an existing tag with the same key.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();

        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.tags.push((key, value)),
        }

        self
    }

    /// Returns a copy of this identity with `suffix` appended to the name as a new segment.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            name: format!("{}.{suffix}", self.name),
            tags: self.tags.clone(),
        }
    }

    /// Returns the hierarchical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all tags in declaration order.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Returns the value of the tag with the given key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl From<&str> for MetricId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MetricId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        if !self.tags.is_empty() {
            f.write_str("{")?;
            for (index, (key, value)) in self.tags.iter().enumerate() {
                if index > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("}")?;
        }

        Ok(())
    }
}

/// The role of a line within a meter's snapshot.
///
/// The statistic is not part of a meter's identity. The encoder injects it as an extra tag or name
/// segment, depending on the flavor.
#[derive(Clone, Copy, Debug)]
pub enum Statistic {
    /// The number of events, used by counters.
    Count,
    /// The current value, used by gauges.
    Value,
    /// The number of running tasks of a long task timer.
    ActiveTasks,
    /// The cumulative duration of running tasks of a long task timer.
    Duration,
    /// A total amount.
    Total,
    /// The cumulative count of observations at or below the given boundary.
    Bucket(f64),
}

impl Statistic {
    /// Returns the tag key used to render this statistic.
    pub fn tag_key(&self) -> &'static str {
        match self {
            Self::Bucket(_) => "le",
            _ => "statistic",
        }
    }

    /// Returns the tag value used to render this statistic.
    pub fn tag_value(&self) -> String {
        let name = match self {
            Self::Count => "count",
            Self::Value => "value",
            Self::ActiveTasks => "activeTasks",
            Self::Duration => "duration",
            Self::Total => "total",
            Self::Bucket(boundary) => return format_number(*boundary),
        };

        name.to_owned()
    }
}

impl PartialEq for Statistic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bucket(a), Self::Bucket(b)) => a.to_bits() == b.to_bits(),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for Statistic {}

impl Hash for Statistic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        if let Self::Bucket(boundary) = self {
            boundary.to_bits().hash(state);
        }
    }
}

/// The unit suffix of a line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LineType {
    /// Counts events since the previous line, `c`.
    Counter,
    /// Reports an absolute value, `g`.
    Gauge,
    /// Reports a duration in milliseconds, `ms`.
    Timing,
    /// Reports a sampled value, `h`.
    Histogram,
}

impl LineType {
    /// Returns the shortcode for this line type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "c",
            Self::Gauge => "g",
            Self::Timing => "ms",
            Self::Histogram => "h",
        }
    }

    /// Formats a value for this line type.
    ///
    /// Counters and timings truncate toward zero to whole base units. All other values use the
    /// shortest representation that round-trips. Returns `None` for non-finite values.
    pub fn format_value(&self, value: f64) -> Option<String> {
        if !value.is_finite() {
            return None;
        }

        Some(match self {
            Self::Counter | Self::Timing => format_number(value.trunc()),
            Self::Gauge | Self::Histogram => format_number(value),
        })
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats a number without a trailing `.0` for integral values.
fn format_number(value: f64) -> String {
    // Normalizes negative zero.
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_tag_replaces_in_place() {
        let id = MetricId::new("my.counter")
            .with_tag("a", "1")
            .with_tag("b", "2")
            .with_tag("a", "3");

        assert_eq!(
            id.tags(),
            &[
                ("a".to_owned(), "3".to_owned()),
                ("b".to_owned(), "2".to_owned())
            ]
        );
        assert_eq!(id.tag("a"), Some("3"));
        assert_eq!(id.tag("c"), None);
    }

    #[test]
    fn test_with_suffix() {
        let id = MetricId::new("my.timer").with_tag("my.tag", "val");
        let histogram = id.with_suffix("histogram");

        assert_eq!(histogram.name(), "my.timer.histogram");
        assert_eq!(histogram.tags(), id.tags());
    }

    #[test]
    fn test_display() {
        assert_eq!(MetricId::from("plain").to_string(), "plain");
        assert_eq!(
            MetricId::new("my.timer").with_tag("my.tag", "val").to_string(),
            "my.timer{my.tag=val}"
        );
    }

    #[test]
    fn test_statistic_tags() {
        assert_eq!(Statistic::ActiveTasks.tag_key(), "statistic");
        assert_eq!(Statistic::ActiveTasks.tag_value(), "activeTasks");
        assert_eq!(Statistic::Bucket(1.0).tag_key(), "le");
        assert_eq!(Statistic::Bucket(1.0).tag_value(), "1");
        assert_eq!(Statistic::Bucket(2.5).tag_value(), "2.5");
    }

    #[test]
    fn test_statistic_identity() {
        use std::collections::HashSet;

        let statistics: HashSet<_> = [
            Statistic::Count,
            Statistic::Count,
            Statistic::Bucket(1.0),
            Statistic::Bucket(2.0),
            Statistic::Bucket(1.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(statistics.len(), 3);
        assert_ne!(Statistic::Bucket(1.0), Statistic::Bucket(2.0));
        assert_ne!(Statistic::Value, Statistic::Duration);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(LineType::Counter.format_value(2.1).as_deref(), Some("2"));
        assert_eq!(LineType::Counter.format_value(-0.5).as_deref(), Some("0"));
        assert_eq!(LineType::Timing.format_value(1.9).as_deref(), Some("1"));
        assert_eq!(LineType::Gauge.format_value(2.0).as_deref(), Some("2"));
        assert_eq!(LineType::Gauge.format_value(0.1).as_deref(), Some("0.1"));
        assert_eq!(LineType::Histogram.format_value(1.5).as_deref(), Some("1.5"));
        assert_eq!(LineType::Gauge.format_value(f64::NAN), None);
        assert_eq!(LineType::Counter.format_value(f64::INFINITY), None);
    }
}
