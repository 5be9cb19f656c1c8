use std::sync::Arc;

use tally_statsd::{LineType, MetricId, Statistic};

use crate::atomic::AtomicF64;
use crate::meter::Measurement;

#[derive(Debug)]
struct CounterState {
    id: MetricId,
    total: AtomicF64,
    baseline: AtomicF64,
    last_step: AtomicF64,
}

/// A monotonically increasing count of events.
///
/// Each step publishes the increments since the previous step. Cloning the counter returns a new
/// handle to the same meter.
#[derive(Clone, Debug)]
pub struct Counter(Arc<CounterState>);

impl Counter {
    pub(crate) fn new(id: MetricId) -> Self {
        Self(Arc::new(CounterState {
            id,
            total: AtomicF64::default(),
            baseline: AtomicF64::default(),
            last_step: AtomicF64::default(),
        }))
    }

    /// Returns the identity of this counter.
    pub fn id(&self) -> &MetricId {
        &self.0.id
    }

    /// Increments the counter by one.
    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// Increments the counter by `amount`.
    ///
    /// Negative and non-finite amounts are ignored.
    pub fn increment_by(&self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.0.total.fetch_add(amount);
        }
    }

    /// Returns the increments of the last completed step.
    ///
    /// This is `0` until the first step completes.
    pub fn count(&self) -> f64 {
        self.0.last_step.load()
    }

    /// Returns the sum of all increments since the counter was created.
    pub fn total(&self) -> f64 {
        self.0.total.load()
    }

    /// Completes the current step and returns its increments.
    ///
    /// The baseline advances to exactly the total that was read, so increments racing with the
    /// flush are reported in the next step.
    fn roll(&self) -> f64 {
        let total = self.0.total.load();
        let delta = total - self.0.baseline.swap(total);
        self.0.last_step.store(delta);
        delta
    }

    pub(crate) fn snapshot<'a>(&'a self, out: &mut Vec<Measurement<'a>>) {
        out.push(Measurement {
            id: &self.0.id,
            statistic: Some(Statistic::Count),
            value: self.roll(),
            line_type: LineType::Counter,
        });
    }
}
