use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tally_common::{Clock, duration_to_millis};
use tally_statsd::{LineType, MetricId, Statistic};

use crate::histogram::{Buckets, StepWindow};
use crate::meter::Measurement;
use crate::registry::StatsdMeterRegistry;

#[derive(Debug)]
struct TimerState {
    id: MetricId,
    histogram_id: MetricId,
    clock: Arc<dyn Clock>,
    window: Mutex<StepWindow>,
}

/// Measures the duration of short events.
///
/// Each step publishes the mean duration of its events in milliseconds, and one bucket line per
/// SLA boundary counting the events at or below that boundary. Steps without events skip the
/// mean but still publish buckets.
#[derive(Clone, Debug)]
pub struct Timer(Arc<TimerState>);

impl Timer {
    /// Returns a builder for a timer with SLA boundaries.
    ///
    /// # Example
    ///
    /// ```
    /// # async fn example() {
    /// use std::time::Duration;
    /// use tally_metrics::{StatsdConfig, StatsdMeterRegistry, Timer};
    ///
    /// let registry = StatsdMeterRegistry::builder(StatsdConfig::default())
    ///     .line_sink(|_: &str| ())
    ///     .build()
    ///     .unwrap();
    ///
    /// let timer = Timer::builder("http.requests")
    ///     .tag("method", "GET")
    ///     .sla([Duration::from_millis(100), Duration::from_millis(500)])
    ///     .register(&registry);
    ///
    /// timer.record(Duration::from_millis(42));
    /// # }
    /// ```
    pub fn builder(id: impl Into<MetricId>) -> TimerBuilder {
        TimerBuilder {
            id: id.into(),
            sla: Vec::new(),
        }
    }

    pub(crate) fn new(id: MetricId, sla: &[Duration], clock: Arc<dyn Clock>) -> Self {
        let buckets = Buckets::new(sla.iter().copied().map(duration_to_millis));

        Self(Arc::new(TimerState {
            histogram_id: id.with_suffix("histogram"),
            id,
            clock,
            window: Mutex::new(StepWindow::new(buckets)),
        }))
    }

    /// Returns the identity of this timer.
    pub fn id(&self) -> &MetricId {
        &self.0.id
    }

    /// Records the duration of a single event.
    pub fn record(&self, duration: Duration) {
        self.0.window.lock().record(duration_to_millis(duration));
    }

    /// Runs `f` and records how long it took.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = self.0.clock.monotonic_time();
        let result = f();
        let end = self.0.clock.monotonic_time();
        self.record(end.saturating_sub(start));
        result
    }

    /// Returns the SLA boundaries in ascending order.
    pub fn sla(&self) -> Vec<Duration> {
        let window = self.0.window.lock();
        window.boundaries().iter().map(|ms| millis(*ms)).collect()
    }

    /// Returns the number of events in the last completed step.
    pub fn count(&self) -> u64 {
        self.0.window.lock().last().count
    }

    /// Returns the summed duration of events in the last completed step.
    pub fn total_time(&self) -> Duration {
        millis(self.0.window.lock().last().total)
    }

    /// Returns the longest event in the last completed step.
    pub fn max(&self) -> Duration {
        millis(self.0.window.lock().last().max)
    }

    /// Returns the mean duration of events in the last completed step.
    pub fn mean(&self) -> Duration {
        millis(self.0.window.lock().last().mean().unwrap_or_default())
    }

    /// Returns each SLA boundary with the number of events at or below it in the last completed
    /// step.
    pub fn bucket_counts(&self) -> Vec<(Duration, u64)> {
        let window = self.0.window.lock();
        window
            .last_buckets()
            .iter()
            .map(|(ms, count)| (millis(*ms), *count))
            .collect()
    }

    pub(crate) fn snapshot<'a>(&'a self, out: &mut Vec<Measurement<'a>>) {
        let (stats, buckets) = self.0.window.lock().roll();

        if let Some(mean) = stats.mean() {
            out.push(Measurement {
                id: &self.0.id,
                statistic: None,
                value: mean,
                line_type: LineType::Timing,
            });
        }

        for (boundary, count) in buckets {
            out.push(Measurement {
                id: &self.0.histogram_id,
                statistic: Some(Statistic::Bucket(boundary)),
                value: count as f64,
                line_type: LineType::Histogram,
            });
        }
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_nanos((ms * 1e6).round() as u64)
}

/// Configures and registers a [`Timer`].
#[derive(Debug)]
#[must_use = "the timer is only created by calling register"]
pub struct TimerBuilder {
    id: MetricId,
    sla: Vec<Duration>,
}

impl TimerBuilder {
    /// Adds a tag to the identity of the timer.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.id = self.id.with_tag(key, value);
        self
    }

    /// Adds SLA boundaries, each publishing a bucket line.
    pub fn sla(mut self, boundaries: impl IntoIterator<Item = Duration>) -> Self {
        self.sla.extend(boundaries);
        self
    }

    /// Returns the timer registered under this identity, creating it if needed.
    ///
    /// An existing timer keeps its original SLA boundaries.
    pub fn register(self, registry: &StatsdMeterRegistry) -> Timer {
        registry.register_timer(self.id, &self.sla)
    }
}
