use std::fmt;
use std::sync::Arc;

use crate::flavor::{Flavor, Line, NameMapper};
use crate::naming::NamingConvention;
use crate::protocol::{LineType, MetricId, Statistic};

/// Encodes meter readings into lines of a configured [`Flavor`].
///
/// Encoding is pure and never fails. Reserved characters are replaced, and only non-finite values
/// are rejected.
///
/// # Example
///
/// ```
/// use tally_statsd::{Flavor, LineEncoder, LineType, MetricId, Statistic};
///
/// let encoder = LineEncoder::new(Flavor::Telegraf);
/// let id = MetricId::new("my.counter").with_tag("my.tag", "val");
///
/// let line = encoder.encode(&id, Some(Statistic::Count), 2.1, LineType::Counter);
/// assert_eq!(line.as_deref(), Some("my_counter,statistic=count,my_tag=val:2|c"));
/// ```
#[derive(Clone)]
pub struct LineEncoder {
    flavor: Flavor,
    mapper: Option<NameMapper>,
}

impl LineEncoder {
    /// Creates an encoder using the default naming of `flavor`.
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            mapper: None,
        }
    }

    /// Replaces the default naming with a custom mapper.
    ///
    /// For [`Flavor::Etsy`], the mapper receives the identity with the statistic appended as its
    /// last tag and returns the full line name. For tagged flavors, it returns the base name and
    /// tags are rendered as usual.
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&MetricId, NamingConvention) -> String + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Returns the configured flavor.
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Encodes a single line.
    ///
    /// Returns `None` if the value is not finite. Such values are never published.
    pub fn encode(
        &self,
        id: &MetricId,
        statistic: Option<Statistic>,
        value: f64,
        line_type: LineType,
    ) -> Option<String> {
        let value = line_type.format_value(value)?;

        let line = Line {
            id,
            statistic,
            value: &value,
            line_type,
        };

        Some(self.flavor.format().render(&line, self.mapper.as_ref()))
    }
}

impl fmt::Debug for LineEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineEncoder")
            .field("flavor", &self.flavor)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

/// Encodes a single line with the default naming of `flavor`.
pub fn encode(
    id: &MetricId,
    flavor: Flavor,
    statistic: Option<Statistic>,
    value: f64,
    line_type: LineType,
) -> Option<String> {
    LineEncoder::new(flavor).encode(id, statistic, value, line_type)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn tagged(name: &str) -> MetricId {
        MetricId::new(name).with_tag("my.tag", "val")
    }

    fn encode_all(
        id: &MetricId,
        statistic: Option<Statistic>,
        value: f64,
        line_type: LineType,
    ) -> Vec<String> {
        Flavor::ALL
            .iter()
            .filter_map(|flavor| encode(id, *flavor, statistic, value, line_type))
            .collect()
    }

    #[test]
    fn test_counter() {
        let lines = encode_all(
            &tagged("my.counter"),
            Some(Statistic::Count),
            2.1,
            LineType::Counter,
        );

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myCounter.myTag.val.statistic.count:2|c",
            "my.counter:2|c|#statistic:count,my.tag:val",
            "my_counter,statistic=count,my_tag=val:2|c",
            "my.counter#statistic=count,my.tag=val:2|c",
        ]
        "###);
    }

    #[test]
    fn test_gauge() {
        let lines = encode_all(
            &tagged("my.gauge"),
            Some(Statistic::Value),
            2.0,
            LineType::Gauge,
        );

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myGauge.myTag.val.statistic.value:2|g",
            "my.gauge:2|g|#statistic:value,my.tag:val",
            "my_gauge,statistic=value,my_tag=val:2|g",
            "my.gauge#statistic=value,my.tag=val:2|g",
        ]
        "###);
    }

    #[test]
    fn test_timer() {
        let lines = encode_all(&tagged("my.timer"), None, 1.0, LineType::Timing);

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myTimer.myTag.val:1|ms",
            "my.timer:1|ms|#my.tag:val",
            "my_timer,my_tag=val:1|ms",
            "my.timer#my.tag=val:1|ms",
        ]
        "###);
    }

    #[test]
    fn test_summary() {
        let lines = encode_all(&tagged("my.summary"), None, 1.0, LineType::Histogram);

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "mySummary.myTag.val:1|h",
            "my.summary:1|h|#my.tag:val",
            "my_summary,my_tag=val:1|h",
            "my.summary#my.tag=val:1|h",
        ]
        "###);
    }

    #[test]
    fn test_long_task_timer() {
        let id = tagged("my.long.task");
        let mut lines = encode_all(&id, Some(Statistic::ActiveTasks), 1.0, LineType::Gauge);
        lines.extend(encode_all(
            &id,
            Some(Statistic::Duration),
            60_000.0,
            LineType::Gauge,
        ));

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myLongTask.myTag.val.statistic.activeTasks:1|g",
            "my.long.task:1|g|#statistic:activeTasks,my.tag:val",
            "my_long_task,statistic=activeTasks,my_tag=val:1|g",
            "my.long.task#statistic=activeTasks,my.tag=val:1|g",
            "myLongTask.myTag.val.statistic.duration:60000|g",
            "my.long.task:60000|g|#statistic:duration,my.tag:val",
            "my_long_task,statistic=duration,my_tag=val:60000|g",
            "my.long.task#statistic=duration,my.tag=val:60000|g",
        ]
        "###);
    }

    #[test]
    fn test_histogram_bucket() {
        let lines = encode_all(
            &tagged("my.timer.histogram"),
            Some(Statistic::Bucket(2.5)),
            3.0,
            LineType::Histogram,
        );

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myTimerHistogram.myTag.val.le.2.5:3|h",
            "my.timer.histogram:3|h|#le:2.5,my.tag:val",
            "my_timer_histogram,le=2.5,my_tag=val:3|h",
            "my.timer.histogram#le=2.5,my.tag=val:3|h",
        ]
        "###);
    }

    #[test]
    fn test_untagged() {
        let lines = encode_all(&MetricId::new("my.timer"), None, 4.0, LineType::Timing);

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "myTimer:4|ms",
            "my.timer:4|ms",
            "my_timer:4|ms",
            "my.timer:4|ms",
        ]
        "###);
    }

    #[test]
    fn test_non_finite_is_skipped() {
        let id = tagged("my.gauge");
        assert!(encode_all(&id, Some(Statistic::Value), f64::NAN, LineType::Gauge).is_empty());
        assert!(
            encode_all(&id, Some(Statistic::Value), f64::INFINITY, LineType::Gauge).is_empty()
        );
    }

    #[test]
    fn test_reserved_characters() {
        let id = MetricId::new("my:counter|x").with_tag("path", "a,b=c d#e");

        let lines = encode_all(&id, Some(Statistic::Count), 1.0, LineType::Counter);

        insta::assert_debug_snapshot!(lines, @r###"
        [
            "my_counter_x.path.a,b=c_d#e.statistic.count:1|c",
            "my_counter_x:1|c|#statistic:count,path:a_b=c d_e",
            "my_counter_x,statistic=count,path=a_b_c_d#e:1|c",
            "my_counter_x#statistic=count,path=a_b_c_d_e:1|c",
        ]
        "###);
    }

    #[test]
    fn test_etsy_tags_are_single_segments() {
        let id = MetricId::new("http.requests")
            .with_tag("route", "api.v1 users")
            .with_tag("host name", "web.1");

        let line = encode(&id, Flavor::Etsy, Some(Statistic::Count), 1.0, LineType::Counter);
        assert_eq!(
            line.as_deref(),
            Some("httpRequests.route.api_v1_users.host_name.web_1.statistic.count:1|c")
        );

        let line = encode(
            &id.with_suffix("histogram"),
            Flavor::Etsy,
            Some(Statistic::Bucket(0.5)),
            2.0,
            LineType::Histogram,
        );
        assert_eq!(
            line.as_deref(),
            Some("httpRequestsHistogram.route.api_v1_users.host_name.web_1.le.0.5:2|h")
        );
    }

    #[test]
    fn test_etsy_mapper_receives_statistic() {
        let encoder = LineEncoder::new(Flavor::Etsy)
            .with_mapper(|id, _| id.name().to_uppercase());

        let line = encoder.encode(
            &tagged("my.counter"),
            Some(Statistic::Count),
            2.1,
            LineType::Counter,
        );
        assert_eq!(line.as_deref(), Some("MY.COUNTER:2|c"));

        let encoder = LineEncoder::new(Flavor::Etsy).with_mapper(|id, _| {
            let statistic = id.tags().last().map(|(_, v)| v.as_str()).unwrap_or_default();
            format!("{}.{statistic}", id.name())
        });

        let line = encoder.encode(
            &tagged("my.counter"),
            Some(Statistic::Count),
            1.0,
            LineType::Counter,
        );
        assert_eq!(line.as_deref(), Some("my.counter.count:1|c"));
    }

    #[test]
    fn test_tagged_mapper_keeps_tags() {
        let encoder = LineEncoder::new(Flavor::Datadog)
            .with_mapper(|id, convention| convention.name(&format!("app.{}", id.name())));

        let line = encoder.encode(
            &tagged("my.counter"),
            Some(Statistic::Count),
            2.0,
            LineType::Counter,
        );
        assert_eq!(
            line.as_deref(),
            Some("app.my.counter:2|c|#statistic:count,my.tag:val")
        );

        let encoder = LineEncoder::new(Flavor::Telegraf)
            .with_mapper(|id, convention| convention.name(&format!("app.{}", id.name())));

        let line = encoder.encode(&tagged("my.timer"), None, 1.0, LineType::Timing);
        assert_eq!(line.as_deref(), Some("app_my_timer,my_tag=val:1|ms"));
    }
}
