use crate::Context;
use crate::scan::{PassReport, scan};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tome_catalog::Repository;
use tome_storage::BackendHandle;
use tracing::{debug, info, warn};

/// Runs scan passes on an interval, at most one at a time.
///
/// A trigger that arrives while a pass is running is dropped, not queued.
pub struct Scanner {
    backend: BackendHandle,
    repo: Repository,
    ctx: Arc<Context>,
    interval: Duration,
    running: AtomicBool,
}

/// Clears the running flag even if the pass future is dropped midway.
struct Running<'a>(&'a AtomicBool);
impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scanner {
    pub fn new(backend: BackendHandle, repo: Repository, ctx: Arc<Context>, interval: Duration) -> Self {
        Self { backend, repo, ctx, interval, running: AtomicBool::new(false) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one pass to completion.
    ///
    /// Returns `None` without doing anything if another pass is in flight.
    pub async fn run_pass(&self) -> Option<PassReport> {
        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            debug!("Scan pass already in flight, dropping trigger");
            return None;
        }
        let _running = Running(&self.running);

        let mut report = PassReport::default();
        let events = scan(&self.backend, &self.repo, &self.ctx);
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => report.record(&event),
                Err(err) => {
                    report.failed += 1;
                    warn!(error = ?err, "Scan entry failed");
                },
            }
        }
        Some(report)
    }

    /// Run passes every [`interval`](Self::interval) until `cancel` fires.
    ///
    /// The first pass starts immediately. A pass that overruns the interval
    /// pushes the next one back rather than causing a burst. Cancellation
    /// is only observed between passes, so an in-flight pass always
    /// finishes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(staging = %self.ctx.staging.display(), interval = ?self.interval, "Scanner started");
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }
            if let Some(report) = self.run_pass().await {
                match report.mutations() + report.failed {
                    0 => debug!(?report, "Scan pass complete"),
                    _ => info!(?report, "Scan pass complete"),
                }
            }
        }
        info!("Scanner stopped");
    }
}
