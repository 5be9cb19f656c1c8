//! StatsD line protocol for the tally metrics registry.
//!
//! This crate turns meter readings into lines of one of four StatsD dialects and delivers them to
//! a [`LineSink`].
//!
//! ## Flavors
//!
//! Each [`Flavor`] renders lines through its own [`FlavorFormat`] strategy and applies a default
//! [`NamingConvention`] to names and tag keys. For a counter `my.counter{my.tag=val}` with a value
//! of `2`:
//!
//! | Flavor     | Line                                          |
//! |------------|-----------------------------------------------|
//! | `etsy`     | `myCounter.myTag.val.statistic.count:2\|c`    |
//! | `datadog`  | `my.counter:2\|c\|#statistic:count,my.tag:val` |
//! | `telegraf` | `my_counter,statistic=count,my_tag=val:2\|c`  |
//! | `sysdig`   | `my.counter#statistic=count,my.tag=val:2\|c`  |
//!
//! ## Encoding
//!
//! ```
//! use tally_statsd::{Flavor, LineEncoder, LineType, MetricId, Statistic};
//!
//! let encoder = LineEncoder::new(Flavor::Datadog);
//! let id = MetricId::new("my.counter").with_tag("my.tag", "val");
//!
//! let line = encoder.encode(&id, Some(Statistic::Count), 2.0, LineType::Counter);
//! assert_eq!(line.as_deref(), Some("my.counter:2|c|#statistic:count,my.tag:val"));
//! ```
//!
//! ## Sinks
//!
//! Lines are written to a [`LineSink`]. Closures, any [`cadence::MetricSink`] wrapped in a
//! [`CadenceSink`], and the socket based [`Upstream`] implement it.

#![warn(missing_docs)]

mod encoder;
mod flavor;
mod naming;
mod protocol;
mod sink;
mod upstream;

pub use self::encoder::*;
pub use self::flavor::*;
pub use self::naming::NamingConvention;
pub use self::protocol::*;
pub use self::sink::*;
pub use self::upstream::*;
