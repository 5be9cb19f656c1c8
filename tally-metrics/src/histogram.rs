//! Windowed statistics shared by timers and distribution summaries.

/// Count, sum and maximum of the observations within one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct StepStats {
    pub count: u64,
    pub total: f64,
    pub max: f64,
}

impl StepStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    /// Returns the arithmetic mean, or `None` without observations.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

/// Cumulative bucket counts for a fixed set of boundaries.
///
/// An observation counts towards every boundary it is less than or equal to.
#[derive(Clone, Debug, Default)]
pub(crate) struct Buckets {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
}

impl Buckets {
    /// Creates buckets for the given boundaries, sorted ascending without duplicates.
    ///
    /// Non-finite boundaries are ignored.
    pub fn new(boundaries: impl IntoIterator<Item = f64>) -> Self {
        let mut boundaries: Vec<f64> = boundaries.into_iter().filter(|b| b.is_finite()).collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup();

        Self {
            counts: vec![0; boundaries.len()],
            boundaries,
        }
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    fn record(&mut self, value: f64) {
        // Boundaries are sorted, so all matches form a suffix.
        let start = self.boundaries.partition_point(|b| *b < value);
        for count in &mut self.counts[start..] {
            *count += 1;
        }
    }

    /// Returns all boundaries with their counts and resets the counts.
    fn take(&mut self) -> Vec<(f64, u64)> {
        self.boundaries
            .iter()
            .copied()
            .zip(self.counts.iter_mut().map(std::mem::take))
            .collect()
    }
}

/// The state of one step: current observations, the previous step's result and buckets.
#[derive(Debug, Default)]
pub(crate) struct StepWindow {
    current: StepStats,
    last: StepStats,
    buckets: Buckets,
    last_buckets: Vec<(f64, u64)>,
}

impl StepWindow {
    pub fn new(buckets: Buckets) -> Self {
        Self {
            last_buckets: buckets.boundaries().iter().map(|b| (*b, 0)).collect(),
            buckets,
            ..Default::default()
        }
    }

    pub fn record(&mut self, value: f64) {
        self.current.record(value);
        self.buckets.record(value);
    }

    /// Returns the statistics of the last completed step.
    pub fn last(&self) -> StepStats {
        self.last
    }

    /// Returns the bucket counts of the last completed step.
    pub fn last_buckets(&self) -> &[(f64, u64)] {
        &self.last_buckets
    }

    pub fn boundaries(&self) -> &[f64] {
        self.buckets.boundaries()
    }

    /// Completes the current step and returns its statistics and bucket counts.
    ///
    /// All accumulators start from zero afterwards.
    pub fn roll(&mut self) -> (StepStats, Vec<(f64, u64)>) {
        self.last = std::mem::take(&mut self.current);
        self.last_buckets = self.buckets.take();
        (self.last, self.last_buckets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_sorted_and_deduplicated() {
        let buckets = Buckets::new([5.0, 1.0, f64::NAN, 5.0, 2.5]);
        assert_eq!(buckets.boundaries(), &[1.0, 2.5, 5.0]);
    }

    #[test]
    fn test_buckets_are_inclusive() {
        let mut window = StepWindow::new(Buckets::new([1.0, 2.0, 3.0]));
        window.record(2.0);
        window.record(0.5);
        window.record(10.0);

        let (stats, buckets) = window.roll();
        assert_eq!(buckets, [(1.0, 1), (2.0, 2), (3.0, 2)]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total, 12.5);
        assert_eq!(stats.max, 10.0);
    }

    #[test]
    fn test_roll_resets() {
        let mut window = StepWindow::new(Buckets::new([1.0]));
        window.record(1.0);
        assert_eq!(window.last_buckets(), &[(1.0, 0)]);

        let (stats, buckets) = window.roll();
        assert_eq!(stats.mean(), Some(1.0));
        assert_eq!(buckets, [(1.0, 1)]);
        assert_eq!(window.last(), stats);
        assert_eq!(window.last_buckets(), &[(1.0, 1)]);

        let (stats, buckets) = window.roll();
        assert_eq!(stats, StepStats::default());
        assert_eq!(stats.mean(), None);
        assert_eq!(buckets, [(1.0, 0)]);
        assert_eq!(window.last(), StepStats::default());
        assert_eq!(window.last_buckets(), &[(1.0, 0)]);
    }
}
