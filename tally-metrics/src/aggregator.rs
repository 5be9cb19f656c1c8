use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tally_common::{Clock, step_index};
use tally_statsd::{LineEncoder, LineType, MetricId, Statistic};

use crate::meter::Meter;

/// The lifecycle state of a [`StepAggregator`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregatorState {
    /// Flushes every completed step.
    Running,
    /// Never flushes again.
    Stopped,
}

/// Turns meter readings into lines once per step.
///
/// Step membership is derived from the clock only. The first poll observing a new step index
/// claims it and flushes; polls within the same step do nothing. Skipped steps collapse into a
/// single flush.
#[derive(Debug)]
pub(crate) struct StepAggregator {
    step: Duration,
    clock: Arc<dyn Clock>,
    encoder: LineEncoder,
    publish_unchanged_meters: bool,
    stopped: AtomicBool,
    current_step: AtomicU64,
    /// Gauge values published in previous flushes by line identity and statistic.
    last_values: Mutex<HashMap<(MetricId, Option<Statistic>), f64>>,
}

impl StepAggregator {
    pub fn new(
        step: Duration,
        clock: Arc<dyn Clock>,
        encoder: LineEncoder,
        publish_unchanged_meters: bool,
    ) -> Self {
        let current_step = step_index(clock.wall_time(), step);

        Self {
            step,
            clock,
            encoder,
            publish_unchanged_meters,
            stopped: AtomicBool::new(false),
            current_step: AtomicU64::new(current_step),
            last_values: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> AggregatorState {
        if self.stopped.load(Ordering::Acquire) {
            AggregatorState::Stopped
        } else {
            AggregatorState::Running
        }
    }

    /// Stops the aggregator. Returns `true` if it was running.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Claims the current step index if a step boundary was crossed since the last claim.
    fn claim_step(&self) -> Option<u64> {
        let step = step_index(self.clock.wall_time(), self.step);
        let previous = self.current_step.load(Ordering::Acquire);

        if step <= previous {
            return None;
        }

        self.current_step
            .compare_exchange(previous, step, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| step)
    }

    /// Flushes all meters if a step completed since the last flush.
    ///
    /// Lines are passed to `publish` in registration order of the meters. Returns `true` if this
    /// call flushed.
    pub fn poll<'a, I, F>(&self, meters: I, publish: F) -> bool
    where
        I: IntoIterator<Item = &'a Meter>,
        F: FnMut(String),
    {
        if self.state() == AggregatorState::Stopped {
            return false;
        }

        let Some(step) = self.claim_step() else {
            return false;
        };

        let lines = self.flush(meters, publish);
        tally_log::trace!(step, lines, "flushed step");
        true
    }

    /// Reads and resets every meter and returns the number of published lines.
    fn flush<'a, I, F>(&self, meters: I, mut publish: F) -> usize
    where
        I: IntoIterator<Item = &'a Meter>,
        F: FnMut(String),
    {
        let mut last_values = self.last_values.lock();
        let mut published = 0;

        for meter in meters {
            for measurement in meter.snapshot() {
                // Deltas and samples add up downstream, so only gauges can be skipped.
                if !self.publish_unchanged_meters && measurement.line_type == LineType::Gauge {
                    let key = (measurement.id.clone(), measurement.statistic);
                    if last_values.insert(key, measurement.value) == Some(measurement.value) {
                        continue;
                    }
                }

                let line = self.encoder.encode(
                    measurement.id,
                    measurement.statistic,
                    measurement.value,
                    measurement.line_type,
                );

                if let Some(line) = line {
                    publish(line);
                    published += 1;
                }
            }
        }

        published
    }
}

#[cfg(test)]
mod tests {
    use tally_common::MockClock;
    use tally_statsd::Flavor;

    use super::*;
    use crate::counter::Counter;
    use crate::gauge::Gauge;
    use crate::long_task::LongTaskTimer;

    const STEP: Duration = Duration::from_secs(60);

    fn aggregator(clock: &MockClock, publish_unchanged_meters: bool) -> StepAggregator {
        StepAggregator::new(
            STEP,
            Arc::new(clock.clone()),
            LineEncoder::new(Flavor::Datadog),
            publish_unchanged_meters,
        )
    }

    fn poll(aggregator: &StepAggregator, meters: &[Meter]) -> Option<Vec<String>> {
        let mut lines = Vec::new();
        aggregator
            .poll(meters, |line| lines.push(line))
            .then_some(lines)
    }

    #[test]
    fn test_flushes_once_per_step() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, true);
        let counter = Counter::new(MetricId::new("my.counter"));
        let meters = [Meter::from(counter.clone())];

        counter.increment();
        assert_eq!(poll(&aggregator, &meters), None);

        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec!["my.counter:1|c|#statistic:count".to_owned()])
        );
        assert_eq!(poll(&aggregator, &meters), None);
    }

    #[test]
    fn test_skipped_steps_collapse() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, true);
        let counter = Counter::new(MetricId::new("my.counter"));
        let meters = [Meter::from(counter.clone())];

        counter.increment_by(3.0);
        clock.add(STEP * 3);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec!["my.counter:3|c|#statistic:count".to_owned()])
        );

        clock.add(STEP / 2);
        assert_eq!(poll(&aggregator, &meters), None);
    }

    #[test]
    fn test_stopped_never_flushes() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, true);
        let meters = [Meter::from(Counter::new(MetricId::new("my.counter")))];

        assert!(aggregator.stop());
        assert!(!aggregator.stop());
        assert_eq!(aggregator.state(), AggregatorState::Stopped);

        clock.add(STEP);
        assert_eq!(poll(&aggregator, &meters), None);
    }

    #[test]
    fn test_skips_unchanged_values() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, false);
        let gauge = Gauge::new(MetricId::new("my.gauge"), 1.0);
        let meters = [Meter::from(gauge.clone())];

        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec!["my.gauge:1|g|#statistic:value".to_owned()])
        );

        clock.add(STEP);
        assert_eq!(poll(&aggregator, &meters), Some(vec![]));

        gauge.set(2.0);
        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec!["my.gauge:2|g|#statistic:value".to_owned()])
        );
    }

    #[test]
    fn test_unchanged_deltas_are_published() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, false);
        let counter = Counter::new(MetricId::new("my.counter"));
        let meters = [Meter::from(counter.clone())];

        for _ in 0..3 {
            counter.increment();
            clock.add(STEP);
            assert_eq!(
                poll(&aggregator, &meters),
                Some(vec!["my.counter:1|c|#statistic:count".to_owned()])
            );
        }
    }

    #[test]
    fn test_unchanged_values_are_tracked_per_statistic() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, false);
        let timer = LongTaskTimer::new(MetricId::new("my.task"), Arc::new(clock.clone()));
        let meters = [Meter::from(timer.clone())];

        let sample = timer.start();
        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec![
                "my.task:1|g|#statistic:activeTasks".to_owned(),
                "my.task:60000|g|#statistic:duration".to_owned(),
            ])
        );

        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec!["my.task:120000|g|#statistic:duration".to_owned()])
        );

        sample.stop();
        clock.add(STEP);
        assert_eq!(
            poll(&aggregator, &meters),
            Some(vec![
                "my.task:0|g|#statistic:activeTasks".to_owned(),
                "my.task:0|g|#statistic:duration".to_owned(),
            ])
        );
    }

    #[test]
    fn test_non_finite_values_are_not_published() {
        let clock = MockClock::new();
        let aggregator = aggregator(&clock, true);
        let meters = [Meter::from(Gauge::new(MetricId::new("my.gauge"), f64::NAN))];

        clock.add(STEP);
        assert_eq!(poll(&aggregator, &meters), Some(vec![]));
    }
}
