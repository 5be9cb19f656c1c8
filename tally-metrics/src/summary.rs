use std::sync::Arc;

use parking_lot::Mutex;
use tally_statsd::{LineType, MetricId, Statistic};

use crate::histogram::{Buckets, StepWindow};
use crate::meter::Measurement;
use crate::registry::StatsdMeterRegistry;

#[derive(Debug)]
struct SummaryState {
    id: MetricId,
    histogram_id: MetricId,
    window: Mutex<StepWindow>,
}

/// Tracks the distribution of sampled amounts, such as payload sizes.
///
/// Publishes like a [`Timer`](crate::Timer), with unitless amounts and the `h` line type.
#[derive(Clone, Debug)]
pub struct DistributionSummary(Arc<SummaryState>);

impl DistributionSummary {
    /// Returns a builder for a distribution summary with SLA boundaries.
    pub fn builder(id: impl Into<MetricId>) -> DistributionSummaryBuilder {
        DistributionSummaryBuilder {
            id: id.into(),
            sla: Vec::new(),
        }
    }

    pub(crate) fn new(id: MetricId, sla: &[f64]) -> Self {
        Self(Arc::new(SummaryState {
            histogram_id: id.with_suffix("histogram"),
            id,
            window: Mutex::new(StepWindow::new(Buckets::new(sla.iter().copied()))),
        }))
    }

    /// Returns the identity of this summary.
    pub fn id(&self) -> &MetricId {
        &self.0.id
    }

    /// Records a single amount.
    ///
    /// Negative and non-finite amounts are ignored.
    pub fn record(&self, amount: f64) {
        if amount.is_finite() && amount >= 0.0 {
            self.0.window.lock().record(amount);
        }
    }

    /// Returns the SLA boundaries in ascending order.
    pub fn sla(&self) -> Vec<f64> {
        self.0.window.lock().boundaries().to_vec()
    }

    /// Returns the number of amounts recorded in the last completed step.
    pub fn count(&self) -> u64 {
        self.0.window.lock().last().count
    }

    /// Returns the sum of amounts recorded in the last completed step.
    pub fn total_amount(&self) -> f64 {
        self.0.window.lock().last().total
    }

    /// Returns the largest amount recorded in the last completed step.
    pub fn max(&self) -> f64 {
        self.0.window.lock().last().max
    }

    /// Returns the mean amount recorded in the last completed step.
    pub fn mean(&self) -> f64 {
        self.0.window.lock().last().mean().unwrap_or_default()
    }

    /// Returns each SLA boundary with the number of amounts at or below it in the last completed
    /// step.
    pub fn bucket_counts(&self) -> Vec<(f64, u64)> {
        self.0.window.lock().last_buckets().to_vec()
    }

    pub(crate) fn snapshot<'a>(&'a self, out: &mut Vec<Measurement<'a>>) {
        let (stats, buckets) = self.0.window.lock().roll();

        if let Some(mean) = stats.mean() {
            out.push(Measurement {
                id: &self.0.id,
                statistic: None,
                value: mean,
                line_type: LineType::Histogram,
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

/// Configures and registers a [`DistributionSummary`].
#[derive(Debug)]
#[must_use = "the summary is only created by calling register"]
pub struct DistributionSummaryBuilder {
    id: MetricId,
    sla: Vec<f64>,
}

impl DistributionSummaryBuilder {
    /// Adds a tag to the identity of the summary.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.id = self.id.with_tag(key, value);
        self
    }

    /// Adds SLA boundaries, each publishing a bucket line.
    pub fn sla(mut self, boundaries: impl IntoIterator<Item = f64>) -> Self {
        self.sla.extend(boundaries);
        self
    }

    /// Returns the summary registered under this identity, creating it if needed.
    ///
    /// An existing summary keeps its original SLA boundaries.
    pub fn register(self, registry: &StatsdMeterRegistry) -> DistributionSummary {
        registry.register_summary(self.id, &self.sla)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let summary = DistributionSummary::new(MetricId::new("payload.size"), &[100.0]);
        summary.record(50.0);
        summary.record(150.0);
        summary.record(-1.0);
        summary.record(f64::NAN);

        let mut out = Vec::new();
        summary.snapshot(&mut out);

        let values: Vec<_> = out.iter().map(|m| (m.statistic, m.value)).collect();
        assert_eq!(
            values,
            [(None, 100.0), (Some(Statistic::Bucket(100.0)), 1.0)]
        );
        assert_eq!(out[0].line_type, LineType::Histogram);

        assert_eq!(summary.count(), 2);
        assert_eq!(summary.total_amount(), 200.0);
        assert_eq!(summary.max(), 150.0);
        assert_eq!(summary.mean(), 100.0);
        assert_eq!(summary.bucket_counts(), [(100.0, 1)]);
    }

    #[test]
    fn test_bucket_counts_before_first_step() {
        let summary = DistributionSummary::new(MetricId::new("payload.size"), &[2.0, 1.0]);
        summary.record(1.0);
        assert_eq!(summary.bucket_counts(), [(1.0, 0), (2.0, 0)]);
    }
}
