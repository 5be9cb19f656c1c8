use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tally_log::LogError;
use tally_statsd::LineSink;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Message {
    Line(String),
    Barrier(oneshot::Sender<()>),
}

/// Forwards lines to a [`LineSink`] without blocking the caller.
///
/// Lines enter a bounded queue drained by a dedicated task. When the queue is full, lines are
/// dropped and counted. Failures of the sink are logged and never reach the publishing side.
#[derive(Debug)]
pub struct LinePublisher {
    tx: RwLock<Option<mpsc::Sender<Message>>>,
    dropped: Arc<AtomicU64>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl LinePublisher {
    /// Spawns the drain task on `runtime` and returns the publisher feeding it.
    ///
    /// `capacity` must be greater than zero.
    pub(crate) fn start(sink: Box<dyn LineSink>, capacity: usize, runtime: &Handle) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let drain = runtime.spawn(drain(rx, sink));

        Self {
            tx: RwLock::new(Some(tx)),
            dropped: Arc::new(AtomicU64::new(0)),
            drain: Mutex::new(Some(drain)),
        }
    }

    /// Creates a publisher that discards all lines.
    pub(crate) fn closed() -> Self {
        Self {
            tx: RwLock::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
            drain: Mutex::new(None),
        }
    }

    /// Enqueues a line without blocking.
    ///
    /// Drops the line if the queue is full or the publisher is stopped.
    pub fn publish(&self, line: String) {
        let tx = self.tx.read();
        let Some(tx) = tx.as_ref() else {
            return;
        };

        if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(Message::Line(line)) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tally_log::debug!(dropped, "line queue full, dropping line");
        }
    }

    /// Returns the number of lines dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns `true` if the publisher no longer accepts lines.
    pub fn is_stopped(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Resolves once every line enqueued before this call reached the sink and the sink was
    /// flushed.
    ///
    /// Resolves immediately if the publisher is stopped.
    pub async fn barrier(&self) {
        let Some(tx) = self.tx.read().clone() else {
            return;
        };

        let (sender, receiver) = oneshot::channel();
        if tx.send(Message::Barrier(sender)).await.is_ok() {
            receiver.await.ok();
        }
    }

    /// Closes the queue.
    ///
    /// Lines enqueued before are still written and the sink is flushed before the drain task
    /// ends. Calling this again has no effect.
    pub fn stop(&self) {
        if self.tx.write().take().is_some() {
            tally_log::debug!("stopping line publisher");
        }
    }

    /// Waits for the drain task to end after [`stop`](Self::stop).
    pub async fn join(&self) {
        let drain = self.drain.lock().take();
        if let Some(drain) = drain {
            if let Err(error) = drain.await {
                tally_log::error!(
                    error = &error as &dyn std::error::Error,
                    "line publisher task failed"
                );
            }
        }
    }
}

impl Drop for LinePublisher {
    fn drop(&mut self) {
        let dropped = self.dropped();
        if dropped > 0 {
            tally_log::warn!("line publisher dropped {dropped} lines due to a full queue");
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<Message>, sink: Box<dyn LineSink>) {
    while let Some(message) = rx.recv().await {
        handle(sink.as_ref(), message);

        // Write everything that is ready, then flush once per batch.
        while let Ok(message) = rx.try_recv() {
            handle(sink.as_ref(), message);
        }

        flush(sink.as_ref());
    }

    flush(sink.as_ref());
    tally_log::debug!("line publisher stopped");
}

fn handle(sink: &dyn LineSink, message: Message) {
    match message {
        Message::Line(line) => emit(sink, &line),
        Message::Barrier(sender) => {
            flush(sink);
            sender.send(()).ok();
        }
    }
}

fn emit(sink: &dyn LineSink, line: &str) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| sink.emit(line))) {
        Ok(Ok(())) => (),
        Ok(Err(error)) => tally_log::warn!("failed to write line: {}", LogError(&error)),
        Err(_) => tally_log::error!("line sink panicked while writing a line"),
    }
}

fn flush(sink: &dyn LineSink) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| sink.flush())) {
        Ok(Ok(())) => (),
        Ok(Err(error)) => tally_log::warn!("failed to flush lines: {}", LogError(&error)),
        Err(_) => tally_log::error!("line sink panicked while flushing"),
    }
}
