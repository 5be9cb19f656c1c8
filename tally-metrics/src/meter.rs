use std::fmt;

use tally_statsd::{LineType, MetricId, Statistic};

use crate::counter::Counter;
use crate::gauge::Gauge;
use crate::long_task::LongTaskTimer;
use crate::summary::DistributionSummary;
use crate::timer::Timer;

/// A single reading of a meter, to be encoded as one line.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Measurement<'a> {
    pub id: &'a MetricId,
    pub statistic: Option<Statistic>,
    pub value: f64,
    pub line_type: LineType,
}

/// The kind of a [`Meter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MeterKind {
    /// See [`Counter`].
    Counter,
    /// See [`Gauge`].
    Gauge,
    /// See [`Timer`].
    Timer,
    /// See [`DistributionSummary`].
    DistributionSummary,
    /// See [`LongTaskTimer`].
    LongTaskTimer,
}

impl MeterKind {
    /// Returns the name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Timer => "timer",
            Self::DistributionSummary => "distribution summary",
            Self::LongTaskTimer => "long task timer",
        }
    }
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any meter registered with a registry.
#[derive(Clone, Debug)]
pub enum Meter {
    /// A [`Counter`].
    Counter(Counter),
    /// A [`Gauge`].
    Gauge(Gauge),
    /// A [`Timer`].
    Timer(Timer),
    /// A [`DistributionSummary`].
    DistributionSummary(DistributionSummary),
    /// A [`LongTaskTimer`].
    LongTaskTimer(LongTaskTimer),
}

impl Meter {
    /// Returns the identity of the meter.
    pub fn id(&self) -> &MetricId {
        match self {
            Self::Counter(m) => m.id(),
            Self::Gauge(m) => m.id(),
            Self::Timer(m) => m.id(),
            Self::DistributionSummary(m) => m.id(),
            Self::LongTaskTimer(m) => m.id(),
        }
    }

    /// Returns the kind of the meter.
    pub fn kind(&self) -> MeterKind {
        match self {
            Self::Counter(_) => MeterKind::Counter,
            Self::Gauge(_) => MeterKind::Gauge,
            Self::Timer(_) => MeterKind::Timer,
            Self::DistributionSummary(_) => MeterKind::DistributionSummary,
            Self::LongTaskTimer(_) => MeterKind::LongTaskTimer,
        }
    }

    /// Reads the meter for a completed step, resetting windowed accumulators.
    ///
    /// Primary lines come first, followed by bucket lines in ascending boundary order.
    pub(crate) fn snapshot(&self) -> Vec<Measurement<'_>> {
        let mut out = Vec::new();

        match self {
            Self::Counter(m) => m.snapshot(&mut out),
            Self::Gauge(m) => m.snapshot(&mut out),
            Self::Timer(m) => m.snapshot(&mut out),
            Self::DistributionSummary(m) => m.snapshot(&mut out),
            Self::LongTaskTimer(m) => m.snapshot(&mut out),
        }

        out
    }
}

macro_rules! impl_meter_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Meter {
                fn from(meter: $variant) -> Self {
                    Self::$variant(meter)
                }
            }

            impl TryFrom<&Meter> for $variant {
                type Error = MeterKind;

                fn try_from(meter: &Meter) -> Result<Self, Self::Error> {
                    match meter {
                        Meter::$variant(m) => Ok(m.clone()),
                        other => Err(other.kind()),
                    }
                }
            }
        )*
    };
}

impl_meter_conversions!(Counter, Gauge, Timer, DistributionSummary, LongTaskTimer);
