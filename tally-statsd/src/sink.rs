use std::io;

/// The destination of encoded lines.
///
/// Implementations receive one line at a time, without a trailing newline. They may buffer lines
/// until [`flush`](Self::flush) is called.
///
/// Any closure taking a `&str` is a sink that never fails:
///
/// ```
/// use tally_statsd::LineSink;
///
/// let sink = |line: &str| assert!(line.ends_with("|c"));
/// sink.emit("my.counter:1|c").unwrap();
/// ```
pub trait LineSink: Send + Sync + 'static {
    /// Writes a single line.
    fn emit(&self, line: &str) -> io::Result<()>;

    /// Writes out any buffered lines.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn emit(&self, line: &str) -> io::Result<()> {
        self(line);
        Ok(())
    }
}

/// Adapts a [`cadence::MetricSink`] into a [`LineSink`].
///
/// # Example
///
/// ```
/// use cadence::SpyMetricSink;
/// use tally_statsd::{CadenceSink, LineSink};
///
/// let (rx, spy) = SpyMetricSink::new();
/// let sink = CadenceSink::new(spy);
///
/// sink.emit("my.counter:1|c").unwrap();
/// assert_eq!(rx.try_recv().unwrap(), b"my.counter:1|c");
/// ```
#[derive(Debug)]
pub struct CadenceSink<T> {
    inner: T,
}

impl<T> CadenceSink<T> {
    /// Wraps the given metric sink.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Returns the wrapped metric sink.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> LineSink for CadenceSink<T>
where
    T: cadence::MetricSink + Send + Sync + 'static,
{
    fn emit(&self, line: &str) -> io::Result<()> {
        self.inner.emit(line).map(drop)
    }

    fn flush(&self) -> io::Result<()> {
        self.inner.flush()
    }
}
