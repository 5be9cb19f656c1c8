//! Helpers for testing the metrics registry.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output is
//!    captured by the test runner. All logs emitted with `tally_log` will show up for test
//!    failures or when run with `--nocapture`.
//!  - To inspect published lines, pass a [`CaptureSink`] to the registry and read them back after
//!    awaiting the publisher's barrier.
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     tally_test::setup();
//!
//!     tally_log::debug!("hello, world!");
//! }
//! ```

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tally_statsd::LineSink;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the workspace crates and mutes all
///    other logs (such as tokio).
pub fn setup() {
    tally_log::__init_test("tally");
}

/// A [`LineSink`] recording every line it receives.
///
/// Clones share the same recorded lines, so keep one clone to read lines back after handing the
/// other to a registry.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
    flushes: Arc<Mutex<usize>>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Removes and returns all lines recorded so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Returns the number of times the sink was flushed.
    pub fn flushes(&self) -> usize {
        *self.flushes.lock()
    }
}

impl LineSink for CaptureSink {
    fn emit(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_owned());
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}
