//! Exclusive claims on staged downloads.
//!
//! The association workflow moves a bundle out from under the scanner.
//! While it holds a [`Reservation`] on a download, the scanner leaves that
//! download alone and a second association of it is refused.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tome_catalog::DownloadId;

/// The set of downloads currently inside an association.
///
/// Cheap to clone; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct Reservations {
    held: Arc<Mutex<HashSet<DownloadId>>>,
}

impl Reservations {
    /// Claim `id`, or `None` if it is already claimed.
    pub fn try_reserve(&self, id: DownloadId) -> Option<Reservation> {
        let inserted = self.held.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        inserted.then(|| Reservation { id, held: Arc::clone(&self.held) })
    }

    pub fn is_reserved(&self, id: DownloadId) -> bool {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).contains(&id)
    }
}

/// A claim on one download, released on drop.
#[derive(Debug)]
pub struct Reservation {
    id: DownloadId,
    held: Arc<Mutex<HashSet<DownloadId>>>,
}

impl Reservation {
    pub fn id(&self) -> DownloadId {
        self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}
