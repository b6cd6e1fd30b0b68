//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the catalog and the
//! storage backend are raised into one of these kinds so that callers only
//! ever match on this enum.

use derive_more::{Display, Error};
use std::path::PathBuf;
use tome_catalog::error::{Error as CatalogError, ErrorKind as CatalogErrorKind};
use tome_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, grouped by what the caller should do about it.
///
/// ### Client Errors
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::Conflict`]
/// - [`ErrorKind::Invalid`]
///
/// ### Server Faults
/// - [`ErrorKind::Io`]
/// - [`ErrorKind::Database`]
/// - [`ErrorKind::Template`]
/// - [`ErrorKind::Compensated`]
/// - [`ErrorKind::Stranded`] - the only one needing manual intervention.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A staged download, book or category doesn't exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A uniqueness rule was violated, or the download is being associated
    /// by someone else right now.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// The request itself is unusable, such as a blank category name.
    #[display("invalid input: {_0}")]
    Invalid(#[error(not(source))] String),
    /// Listing, creating, renaming or writing failed on the filesystem.
    #[display("filesystem error")]
    Io,
    #[display("catalog database error")]
    Database,
    /// The destination template failed to render or produced an unsafe path.
    #[display("could not render the destination path")]
    Template,
    /// Linking failed after the move, and the files were moved back.
    #[display("linking failed, files safely returned to staging")]
    Compensated,
    /// Linking failed after the move, and so did moving the files back.
    #[display("files stranded in library tree at {}, not linked in catalog (staged at {})", to.display(), from.display())]
    Stranded { from: PathBuf, to: PathBuf },
}

impl ErrorKind {
    /// Raise a catalog error, keeping its frame in the error tree.
    ///
    /// Catalog not-found and conflict errors keep their meaning; everything
    /// else is a database fault.
    #[track_caller]
    pub(crate) fn catalog(err: CatalogError) -> Error {
        let kind = match &*err {
            CatalogErrorKind::NotFound(what) => Self::NotFound(what.clone()),
            CatalogErrorKind::Conflict(what) => Self::Conflict(what.clone()),
            _ => Self::Database,
        };
        err.raise(kind)
    }

    /// Raise a storage error, keeping its frame in the error tree.
    ///
    /// An occupied destination is a conflict; everything else is I/O.
    #[track_caller]
    pub(crate) fn storage(err: StorageError) -> Error {
        let kind = match &*err {
            StorageErrorKind::AlreadyExists(path) => Self::Conflict(format!("{} already exists", path.display())),
            _ => Self::Io,
        };
        err.raise(kind)
    }

    /// `true` for errors the caller caused (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Conflict(_) | Self::Invalid(_))
    }

    /// `true` if the library is left in a state only a human can repair.
    pub fn needs_intervention(&self) -> bool {
        matches!(self, Self::Stranded { .. })
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Database | Self::Compensated)
    }
}
