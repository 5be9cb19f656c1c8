use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;
use tally_common::{Clock, SystemClock};
use tally_statsd::{LineEncoder, LineSink, MetricId, NameMapper, NamingConvention, Upstream};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::aggregator::{AggregatorState, StepAggregator};
use crate::config::StatsdConfig;
use crate::counter::Counter;
use crate::gauge::Gauge;
use crate::long_task::LongTaskTimer;
use crate::meter::{Meter, MeterKind};
use crate::publisher::LinePublisher;
use crate::summary::DistributionSummary;
use crate::timer::Timer;

/// An error returned when building a [`StatsdMeterRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry was built outside of a Tokio runtime.
    #[error("statsd registry must be built within a tokio runtime")]
    NoRuntime,
    /// A configuration value is out of range.
    #[error("invalid statsd configuration: {0}")]
    InvalidConfig(&'static str),
    /// The socket to the StatsD daemon could not be opened.
    #[error("failed to connect to statsd at {addr}")]
    Connect {
        /// The address of the StatsD daemon.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },
}

/// Configures a [`StatsdMeterRegistry`].
#[must_use = "the registry is only created by calling build"]
pub struct StatsdMeterRegistryBuilder {
    config: StatsdConfig,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Box<dyn LineSink>>,
    mapper: Option<NameMapper>,
}

impl StatsdMeterRegistryBuilder {
    /// Uses `clock` for step boundaries and durations instead of the system clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Writes lines to `sink` instead of a socket connected to the configured host and port.
    pub fn line_sink(mut self, sink: impl LineSink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replaces the default naming of the configured flavor.
    ///
    /// See [`LineEncoder::with_mapper`] for how the mapper applies to each flavor.
    pub fn name_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&MetricId, NamingConvention) -> String + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    fn validate(config: &StatsdConfig) -> Result<(), RegistryError> {
        if config.step == 0 {
            return Err(RegistryError::InvalidConfig("step must be positive"));
        }
        if config.polling_frequency == 0 {
            return Err(RegistryError::InvalidConfig(
                "polling_frequency must be positive",
            ));
        }
        if config.queue_size == 0 {
            return Err(RegistryError::InvalidConfig("queue_size must be positive"));
        }
        Ok(())
    }

    /// Creates the registry and starts publishing.
    ///
    /// Unless the registry is disabled, this spawns the line publisher and a task polling for
    /// completed steps on the current Tokio runtime.
    pub fn build(self) -> Result<StatsdMeterRegistry, RegistryError> {
        let Self {
            config,
            clock,
            sink,
            mapper,
        } = self;

        Self::validate(&config)?;

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        let mut encoder = LineEncoder::new(config.flavor);
        if let Some(mapper) = mapper {
            encoder = encoder.with_mapper(move |id, convention| mapper(id, convention));
        }

        let aggregator = StepAggregator::new(
            config.step_duration(),
            clock.clone(),
            encoder,
            config.publish_unchanged_meters,
        );

        if !config.enabled {
            tally_log::debug!("statsd registry is disabled");
            aggregator.stop();

            let (shutdown, _) = watch::channel(false);
            return Ok(StatsdMeterRegistry {
                inner: Arc::new(RegistryInner {
                    config,
                    clock,
                    aggregator,
                    publisher: LinePublisher::closed(),
                    meters: RwLock::new(IndexMap::new()),
                    shutdown,
                }),
            });
        }

        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;

        let sink: Box<dyn LineSink> = match sink {
            Some(sink) => sink,
            None => {
                let addr = config.addr();
                let upstream = Upstream::connect(&addr, config.max_packet_length)
                    .map_err(|source| RegistryError::Connect {
                        addr: addr.clone(),
                        source,
                    })?;

                tally_log::info!("reporting metrics to statsd at {addr}");
                Box::new(upstream)
            }
        };

        let publisher = LinePublisher::start(sink, config.queue_size, &runtime);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let interval = config.polling_interval();

        let inner = Arc::new(RegistryInner {
            config,
            clock,
            aggregator,
            publisher,
            meters: RwLock::new(IndexMap::new()),
            shutdown,
        });

        spawn_poller(Arc::downgrade(&inner), interval, shutdown_rx, &runtime);
        tally_log::debug!(flavor = %inner.config.flavor, "statsd registry started");

        Ok(StatsdMeterRegistry { inner })
    }
}

#[derive(Debug)]
struct RegistryInner {
    config: StatsdConfig,
    clock: Arc<dyn Clock>,
    aggregator: StepAggregator,
    publisher: LinePublisher,
    meters: RwLock<IndexMap<MetricId, Meter>>,
    shutdown: watch::Sender<bool>,
}

impl RegistryInner {
    fn poll(&self) -> bool {
        // Gauge sources and the name mapper may register meters while flushing.
        let meters: Vec<Meter> = self.meters.read().values().cloned().collect();
        self.aggregator
            .poll(&meters, |line| self.publisher.publish(line))
    }

    fn stop(&self) {
        if self.aggregator.stop() {
            tally_log::debug!("statsd registry stopped");
        }

        self.shutdown.send_replace(true);
        self.publisher.stop();
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_poller(
    registry: Weak<RegistryInner>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    runtime: &Handle,
) {
    runtime.spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,
                _ = ticker.tick() => match registry.upgrade() {
                    Some(registry) => {
                        registry.poll();
                    }
                    None => break,
                },
            }
        }

        tally_log::trace!("stopped polling meters");
    });
}

/// A meter registry publishing to a StatsD daemon once per step.
///
/// Meters are created on first use and identified by their [`MetricId`]. Every completed step,
/// each meter is read in registration order, encoded in the configured flavor, and handed to a
/// non-blocking line publisher. Recording never blocks on the network and never fails.
///
/// Cloning the registry returns a new handle to the same meters. The registry stops when
/// [`stop`](Self::stop) is called or the last handle is dropped.
///
/// # Example
///
/// ```
/// # async fn example() -> Result<(), tally_metrics::RegistryError> {
/// use tally_metrics::{StatsdConfig, StatsdMeterRegistry};
///
/// let registry = StatsdMeterRegistry::builder(StatsdConfig::default())
///     .line_sink(|line: &str| println!("{line}"))
///     .build()?;
///
/// registry.counter("jobs.processed").increment();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct StatsdMeterRegistry {
    inner: Arc<RegistryInner>,
}

impl StatsdMeterRegistry {
    /// Returns a builder for a registry with the given configuration.
    pub fn builder(config: StatsdConfig) -> StatsdMeterRegistryBuilder {
        StatsdMeterRegistryBuilder {
            config,
            clock: None,
            sink: None,
            mapper: None,
        }
    }

    /// Returns the configuration of this registry.
    pub fn config(&self) -> &StatsdConfig {
        &self.inner.config
    }

    /// Returns the line publisher of this registry.
    pub fn publisher(&self) -> &LinePublisher {
        &self.inner.publisher
    }

    /// Returns all registered meters in registration order.
    pub fn meters(&self) -> Vec<Meter> {
        self.inner.meters.read().values().cloned().collect()
    }

    /// Returns the counter registered under `id`, creating it if needed.
    pub fn counter(&self, id: impl Into<MetricId>) -> Counter {
        self.get_or_register(id.into(), Counter::new)
    }

    /// Returns the gauge registered under `id` after setting it to `value`.
    ///
    /// Creates the gauge if needed.
    pub fn gauge(&self, id: impl Into<MetricId>, value: f64) -> Gauge {
        let gauge = self.get_or_register(id.into(), |id| Gauge::new(id, value));
        gauge.set(value);
        gauge
    }

    /// Returns the gauge registered under `id`, creating it with a value read from `source`.
    ///
    /// The gauge only holds a weak reference to `source`. Once it is dropped, the gauge is no longer
    /// published.
    pub fn gauge_with<T, F>(&self, id: impl Into<MetricId>, source: &Arc<T>, f: F) -> Gauge
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        self.get_or_register(id.into(), |id| Gauge::with_source(id, source, f))
    }

    /// Returns the timer registered under `id`, creating it without SLA boundaries if needed.
    ///
    /// Use [`Timer::builder`] to declare SLA boundaries.
    pub fn timer(&self, id: impl Into<MetricId>) -> Timer {
        self.register_timer(id.into(), &[])
    }

    /// Returns the distribution summary registered under `id`, creating it if needed.
    ///
    /// Use [`DistributionSummary::builder`] to declare SLA boundaries.
    pub fn summary(&self, id: impl Into<MetricId>) -> DistributionSummary {
        self.register_summary(id.into(), &[])
    }

    /// Returns the long task timer registered under `id`, creating it if needed.
    pub fn long_task_timer(&self, id: impl Into<MetricId>) -> LongTaskTimer {
        let clock = self.inner.clock.clone();
        self.get_or_register(id.into(), |id| LongTaskTimer::new(id, clock))
    }

    pub(crate) fn register_timer(&self, id: MetricId, sla: &[Duration]) -> Timer {
        let clock = self.inner.clock.clone();
        self.get_or_register(id, |id| Timer::new(id, sla, clock))
    }

    pub(crate) fn register_summary(&self, id: MetricId, sla: &[f64]) -> DistributionSummary {
        self.get_or_register(id, |id| DistributionSummary::new(id, sla))
    }

    /// Flushes all meters if a step completed since the last flush.
    ///
    /// The registry polls on its own at the configured polling frequency. Returns `true` if this
    /// call flushed.
    pub fn poll(&self) -> bool {
        self.inner.poll()
    }

    /// Stops publishing.
    ///
    /// Lines of already completed steps are still written. Meters keep accepting recordings, but
    /// no further lines are produced. Calling this again has no effect.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stops publishing and waits until all pending lines were written.
    pub async fn close(&self) {
        self.stop();
        self.inner.publisher.join().await;
    }

    /// Returns `true` if the registry no longer publishes.
    pub fn is_stopped(&self) -> bool {
        self.inner.aggregator.state() == AggregatorState::Stopped
    }

    fn get_or_register<T>(&self, id: MetricId, create: impl FnOnce(MetricId) -> T) -> T
    where
        T: Clone + Into<Meter> + for<'a> TryFrom<&'a Meter, Error = MeterKind>,
    {
        let existing = self.inner.meters.read().get(&id).cloned();

        let meter = match existing {
            Some(meter) => meter,
            None => match self.inner.meters.write().entry(id) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    let meter = create(entry.key().clone());
                    entry.insert(meter.clone().into());
                    return meter;
                }
            },
        };

        match T::try_from(&meter) {
            Ok(meter) => meter,
            Err(existing) => {
                let detached = create(meter.id().clone());
                let requested: Meter = detached.clone().into();

                tally_log::error!(
                    meter = %meter.id(),
                    "cannot register {} as {existing}, returning a detached {} that is never published",
                    meter.id(),
                    requested.kind(),
                );

                detached
            }
        }
    }
}
