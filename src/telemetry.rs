//! Background publishing of diagnostics reports.
//!
//! The scheduler hands every tick's report to [`TelemetryPublisher::offer`],
//! which never blocks: reports go through a bounded channel with `try_send`
//! and are counted as dropped when the worker falls behind. The worker keeps
//! only the newest report and publishes it on a fixed interval, independent of
//! the tick rate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diagnostics::{DiagnosticsReport, DiagnosticsSink};
use crate::error::{ExecutionError, FactLogResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Publish interval in milliseconds.
    pub interval_ms: u64,
    /// Max queued reports before `offer` starts dropping.
    pub queue_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            queue_capacity: 16,
        }
    }
}

/// Publishes diagnostics from a dedicated worker thread.
#[derive(Debug)]
pub struct TelemetryPublisher {
    tx: Option<Sender<DiagnosticsReport>>,
    dropped_reports: AtomicU64,
    published_reports: Arc<AtomicU64>,
    join: Option<JoinHandle<()>>,
}

impl TelemetryPublisher {
    /// Starts the worker thread publishing to `sink`.
    pub fn spawn<S>(cfg: TelemetryConfig, sink: S) -> FactLogResult<Self>
    where
        S: DiagnosticsSink + 'static,
    {
        let (tx, rx) = bounded::<DiagnosticsReport>(cfg.queue_capacity.max(1));
        let interval = Duration::from_millis(cfg.interval_ms.max(1));
        let published_reports = Arc::new(AtomicU64::new(0));

        let thread_published = Arc::clone(&published_reports);
        let join = thread::Builder::new()
            .name("factlog-telemetry".to_string())
            .spawn(move || worker_loop(sink, interval, rx, thread_published))
            .map_err(|e| ExecutionError::TelemetryUnavailable {
                message: format!("failed to spawn telemetry worker: {e}"),
            })?;

        Ok(Self {
            tx: Some(tx),
            dropped_reports: AtomicU64::new(0),
            published_reports,
            join: Some(join),
        })
    }

    /// Non-blocking report enqueue.
    pub fn offer(&self, report: DiagnosticsReport) {
        let Some(tx) = &self.tx else {
            self.dropped_reports.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped_reports.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn dropped_reports(&self) -> u64 {
        self.dropped_reports.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn published_reports(&self) -> u64 {
        self.published_reports.load(Ordering::Relaxed)
    }

    /// Stops the worker after it has published the last offered report.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel is the worker's exit signal.
        drop(self.tx.take());
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                warn!("telemetry worker panicked");
            }
        }
    }
}

impl Drop for TelemetryPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<S: DiagnosticsSink>(
    mut sink: S,
    interval: Duration,
    rx: Receiver<DiagnosticsReport>,
    published: Arc<AtomicU64>,
) {
    let ticker = tick(interval);
    let mut latest: Option<DiagnosticsReport> = None;
    let mut closed = false;

    while !closed {
        select! {
            recv(rx) -> msg => {
                match msg {
                    Ok(report) => latest = Some(report),
                    Err(_) => closed = true,
                }
            }
            recv(ticker) -> _ => {
                if let Some(report) = latest.take() {
                    publish(&mut sink, &report, &published);
                }
            }
        }
    }

    if let Some(report) = latest.take() {
        publish(&mut sink, &report, &published);
    }
    debug!("telemetry worker stopped");
}

fn publish<S: DiagnosticsSink>(sink: &mut S, report: &DiagnosticsReport, published: &AtomicU64) {
    match sink.publish(report) {
        Ok(()) => {
            published.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => warn!(tick = report.tick, error = %err, "failed to publish diagnostics"),
    }
}
