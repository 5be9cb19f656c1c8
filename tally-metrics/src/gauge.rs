use std::fmt;
use std::sync::{Arc, Weak};

use tally_statsd::{LineType, MetricId, Statistic};

use crate::atomic::AtomicF64;
use crate::meter::Measurement;

enum GaugeSource {
    Value(AtomicF64),
    Function(Box<dyn Fn() -> f64 + Send + Sync>),
}

impl fmt::Debug for GaugeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(&value.load()).finish(),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

#[derive(Debug)]
struct GaugeState {
    id: MetricId,
    source: GaugeSource,
}

/// The current value of something, sampled at every step.
///
/// A gauge either holds the last value passed to [`set`](Self::set), or reads its value from a
/// source object at flush time. Gauges are never reset.
#[derive(Clone, Debug)]
pub struct Gauge(Arc<GaugeState>);

impl Gauge {
    pub(crate) fn new(id: MetricId, value: f64) -> Self {
        Self(Arc::new(GaugeState {
            id,
            source: GaugeSource::Value(AtomicF64::new(value)),
        }))
    }

    /// Creates a gauge reading its value from `source`.
    ///
    /// The gauge holds a weak reference. Once the source is dropped, the value becomes `NaN` and
    /// the gauge is no longer published.
    pub(crate) fn with_source<T, F>(id: MetricId, source: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let source: Weak<T> = Arc::downgrade(source);
        let function = move || source.upgrade().map_or(f64::NAN, |value| f(&value));

        Self(Arc::new(GaugeState {
            id,
            source: GaugeSource::Function(Box::new(function)),
        }))
    }

    /// Returns the identity of this gauge.
    pub fn id(&self) -> &MetricId {
        &self.0.id
    }

    /// Sets the value of the gauge.
    ///
    /// Has no effect on gauges reading from a source.
    pub fn set(&self, value: f64) {
        if let GaugeSource::Value(ref current) = self.0.source {
            current.store(value);
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> f64 {
        match self.0.source {
            GaugeSource::Value(ref value) => value.load(),
            GaugeSource::Function(ref function) => function(),
        }
    }

    pub(crate) fn snapshot<'a>(&'a self, out: &mut Vec<Measurement<'a>>) {
        out.push(Measurement {
            id: &self.0.id,
            statistic: Some(Statistic::Value),
            value: self.value(),
            line_type: LineType::Gauge,
        });
    }
}
