//! A step-windowed meter registry publishing to StatsD.
//!
//! Applications record into meters obtained from a [`StatsdMeterRegistry`]. Once per step, the
//! registry reads every meter, encodes the readings as lines in the configured
//! [`Flavor`](tally_statsd::Flavor), and hands them to a non-blocking [`LinePublisher`] that
//! writes to a [`LineSink`](tally_statsd::LineSink).
//!
//! ## Meters
//!
//! | Meter                   | Lines per step                                        |
//! |-------------------------|-------------------------------------------------------|
//! | [`Counter`]             | increments since the previous step (`c`)              |
//! | [`Gauge`]               | current value (`g`)                                   |
//! | [`Timer`]               | mean duration in ms (`ms`), plus SLA buckets (`h`)    |
//! | [`DistributionSummary`] | mean amount (`h`), plus SLA buckets (`h`)             |
//! | [`LongTaskTimer`]       | running tasks and their combined duration in ms (`g`) |
//!
//! Counters, timers, summaries and buckets restart from zero every step. Gauges and long task
//! timers report their current state.
//!
//! ## Steps
//!
//! Step boundaries come from the registry's [`Clock`](tally_common::Clock) only. The registry
//! polls at the configured polling frequency, and the first poll after a boundary flushes.
//! Several missed steps result in a single flush.
//!
//! ```
//! # async fn example() -> Result<(), tally_metrics::RegistryError> {
//! use std::time::Duration;
//!
//! use tally_common::MockClock;
//! use tally_metrics::{StatsdConfig, StatsdMeterRegistry};
//! use tally_statsd::MetricId;
//!
//! let clock = MockClock::new();
//! let registry = StatsdMeterRegistry::builder(StatsdConfig::default())
//!     .clock(clock.clone())
//!     .line_sink(|line: &str| assert_eq!(line, "my.counter:2|c|#statistic:count,my.tag:val"))
//!     .build()?;
//!
//! let counter = registry.counter(MetricId::new("my.counter").with_tag("my.tag", "val"));
//! counter.increment_by(2.1);
//!
//! clock.add(Duration::from_secs(60));
//! registry.poll();
//! registry.publisher().barrier().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod aggregator;
mod atomic;
mod config;
mod counter;
mod gauge;
mod histogram;
mod long_task;
mod meter;
mod publisher;
mod registry;
mod summary;
mod timer;

pub use self::config::*;
pub use self::counter::*;
pub use self::gauge::*;
pub use self::long_task::*;
pub use self::meter::{Meter, MeterKind};
pub use self::publisher::*;
pub use self::registry::*;
pub use self::summary::*;
pub use self::timer::*;
