use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tally_common::{Clock, duration_to_millis};
use tally_statsd::{LineType, MetricId, Statistic};

use crate::meter::Measurement;

#[derive(Debug)]
struct LongTaskState {
    id: MetricId,
    clock: Arc<dyn Clock>,
    next_task: AtomicU64,
    /// Start times of running tasks by task id.
    tasks: Mutex<IndexMap<u64, Duration>>,
}

impl LongTaskState {
    fn elapsed(&self, start: Duration) -> Duration {
        self.clock.monotonic_time().saturating_sub(start)
    }
}

/// Tracks tasks that run for a long time, while they are running.
///
/// Each step publishes the number of running tasks and their combined running time in
/// milliseconds. Both are derived from the clock at flush time and never reset.
#[derive(Clone, Debug)]
pub struct LongTaskTimer(Arc<LongTaskState>);

impl LongTaskTimer {
    pub(crate) fn new(id: MetricId, clock: Arc<dyn Clock>) -> Self {
        Self(Arc::new(LongTaskState {
            id,
            clock,
            next_task: AtomicU64::new(0),
            tasks: Mutex::new(IndexMap::new()),
        }))
    }

    /// Returns the identity of this timer.
    pub fn id(&self) -> &MetricId {
        &self.0.id
    }

    /// Starts timing a task.
    ///
    /// The task runs until [`LongTaskSample::stop`] is called. Dropping the sample without stopping
    /// it keeps the task running.
    pub fn start(&self) -> LongTaskSample {
        let task = self.0.next_task.fetch_add(1, Ordering::Relaxed);
        let start = self.0.clock.monotonic_time();
        self.0.tasks.lock().insert(task, start);

        LongTaskSample {
            timer: self.0.clone(),
            task,
        }
    }

    /// Returns the number of running tasks.
    pub fn active_tasks(&self) -> usize {
        self.0.tasks.lock().len()
    }

    /// Returns the combined running time of all running tasks.
    pub fn duration(&self) -> Duration {
        let tasks = self.0.tasks.lock();
        tasks.values().map(|start| self.0.elapsed(*start)).sum()
    }

    pub(crate) fn snapshot<'a>(&'a self, out: &mut Vec<Measurement<'a>>) {
        let (active, duration) = {
            let tasks = self.0.tasks.lock();
            let duration: Duration = tasks.values().map(|start| self.0.elapsed(*start)).sum();
            (tasks.len(), duration)
        };

        out.push(Measurement {
            id: &self.0.id,
            statistic: Some(Statistic::ActiveTasks),
            value: active as f64,
            line_type: LineType::Gauge,
        });
        out.push(Measurement {
            id: &self.0.id,
            statistic: Some(Statistic::Duration),
            value: duration_to_millis(duration),
            line_type: LineType::Gauge,
        });
    }
}

/// A running task of a [`LongTaskTimer`].
#[derive(Debug)]
pub struct LongTaskSample {
    timer: Arc<LongTaskState>,
    task: u64,
}

impl LongTaskSample {
    /// Returns the unique id of this task within its timer.
    pub fn task_id(&self) -> u64 {
        self.task
    }

    /// Returns how long the task has been running, or `None` if it was stopped.
    pub fn duration(&self) -> Option<Duration> {
        let start = *self.timer.tasks.lock().get(&self.task)?;
        Some(self.timer.elapsed(start))
    }

    /// Stops the task and returns how long it ran.
    ///
    /// Returns `None` if the task was already stopped.
    pub fn stop(&self) -> Option<Duration> {
        let start = self.timer.tasks.lock().swap_remove(&self.task)?;
        Some(self.timer.elapsed(start))
    }
}

#[cfg(test)]
mod tests {
    use tally_common::MockClock;

    use super::*;

    #[test]
    fn test_start_stop() {
        let clock = MockClock::new();
        let timer = LongTaskTimer::new(MetricId::new("my.task"), Arc::new(clock.clone()));

        let first = timer.start();
        clock.add(Duration::from_secs(10));
        let second = timer.start();
        assert_ne!(first.task_id(), second.task_id());

        clock.add(Duration::from_secs(5));
        assert_eq!(timer.active_tasks(), 2);
        assert_eq!(timer.duration(), Duration::from_secs(20));
        assert_eq!(second.duration(), Some(Duration::from_secs(5)));

        assert_eq!(first.stop(), Some(Duration::from_secs(15)));
        assert_eq!(first.stop(), None);
        assert_eq!(first.duration(), None);
        assert_eq!(timer.active_tasks(), 1);
        assert_eq!(timer.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_snapshot_is_not_reset() {
        let clock = MockClock::new();
        let timer = LongTaskTimer::new(MetricId::new("my.task"), Arc::new(clock.clone()));
        let _sample = timer.start();

        for step in 1..=2 {
            clock.add(Duration::from_secs(60));

            let mut out = Vec::new();
            timer.snapshot(&mut out);
            let values: Vec<_> = out.iter().map(|m| (m.statistic, m.value)).collect();
            assert_eq!(
                values,
                [
                    (Some(Statistic::ActiveTasks), 1.0),
                    (Some(Statistic::Duration), 60_000.0 * step as f64),
                ]
            );
        }
    }
}
