//! Reconciliation of the staging directory against staged download rows.
//!
//! A pass runs two phases in a fixed order:
//! 1. **Refresh**: every recorded download whose directory is gone is
//!    deleted; every other one gets its manifest rebuilt, and written back
//!    only if it changed.
//! 2. **Discovery**: every directory in the staging root that isn't
//!    recorded yet gets a new row.
//!
//! [`scan`] streams one pass as [`ScanEvent`]s. [`Scanner`] runs passes on
//! an interval, never two at once.

mod scheduler;
mod stream;

pub use self::scheduler::Scanner;
pub use self::stream::scan;
use derive_more::Display;
use tome_catalog::DownloadId;

/// Progress events emitted by [`scan`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. One of [`Removed`](Self::Removed), [`Refreshed`](Self::Refreshed),
///    [`Unchanged`](Self::Unchanged) or [`Skipped`](Self::Skipped) per
///    recorded download.
/// 3. [`Discovered`](Self::Discovered) per new directory.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// Failures on a single entry are surfaced as `Err` items in place of that
/// entry's event, and the stream carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started,
    /// The directory vanished from disk, so its row was deleted.
    Removed { id: DownloadId, directory: String },
    /// The manifest changed and was written back.
    Refreshed { id: DownloadId, directory: String },
    Unchanged { id: DownloadId, directory: String },
    /// The download is being associated right now; left alone this pass.
    Skipped { id: DownloadId, directory: String },
    /// A new directory got a row.
    Discovered { id: DownloadId, directory: String },
    Complete,
}

/// Per-event tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[display(
    "{discovered} discovered, {refreshed} refreshed, {removed} removed, {unchanged} unchanged, {skipped} skipped, {failed} failed"
)]
pub struct PassReport {
    pub removed: usize,
    pub refreshed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub discovered: usize,
    pub failed: usize,
}

impl PassReport {
    pub fn record(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Removed { .. } => self.removed += 1,
            ScanEvent::Refreshed { .. } => self.refreshed += 1,
            ScanEvent::Unchanged { .. } => self.unchanged += 1,
            ScanEvent::Skipped { .. } => self.skipped += 1,
            ScanEvent::Discovered { .. } => self.discovered += 1,
            ScanEvent::Started | ScanEvent::Complete => {},
        }
    }

    /// Number of catalog writes the pass made.
    pub fn mutations(&self) -> usize {
        self.removed + self.refreshed + self.discovered
    }
}
