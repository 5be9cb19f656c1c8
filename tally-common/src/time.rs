//! Time sources and step arithmetic.
//!
//! Nothing in the registry reads the system clock directly. All time flows through the [`Clock`]
//! trait, so step boundaries can be driven deterministically with a [`MockClock`] in tests while
//! production code uses the [`SystemClock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// A source of wall and monotonic time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the time elapsed since the UNIX epoch.
    ///
    /// Step boundaries are aligned to this value.
    fn wall_time(&self) -> Duration;

    /// Returns the time elapsed since an arbitrary, fixed origin.
    ///
    /// Use this to measure durations. It never goes backwards.
    fn monotonic_time(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn wall_time(&self) -> Duration {
        (**self).wall_time()
    }

    fn monotonic_time(&self) -> Duration {
        (**self).monotonic_time()
    }
}

/// The production clock backed by [`SystemTime`] and [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock whose monotonic time starts now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn monotonic_time(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A manually advanced clock for virtual-time tests.
///
/// Wall and monotonic time move together and only change through [`MockClock::add`]. Clones share
/// the same underlying time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tally_common::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// let other = clock.clone();
///
/// clock.add(Duration::from_secs(60));
/// assert_eq!(other.wall_time(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    nanos: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a mock clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `duration` and returns the new time.
    pub fn add(&self, duration: Duration) -> Duration {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let previous = self.nanos.fetch_add(nanos, Ordering::SeqCst);
        Duration::from_nanos(previous.saturating_add(nanos))
    }

    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for MockClock {
    fn wall_time(&self) -> Duration {
        self.now()
    }

    fn monotonic_time(&self) -> Duration {
        self.now()
    }
}

/// Returns the index of the step window that contains `time`.
///
/// Windows are half-open: a time exactly on a boundary belongs to the window that starts there. A
/// zero `step` maps every time into window `0`.
pub fn step_index(time: Duration, step: Duration) -> u64 {
    let step = step.as_nanos();
    if step == 0 {
        return 0;
    }

    u64::try_from(time.as_nanos() / step).unwrap_or(u64::MAX)
}

/// Converts a duration into fractional milliseconds.
pub fn duration_to_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}
