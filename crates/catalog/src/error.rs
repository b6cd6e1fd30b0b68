//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use exn::ResultExt;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The referenced row does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A unique constraint rejected the write (duplicate directory, ISBN,
    /// ASIN or category name).
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Serialization/deserialization error.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

/// Raises unique-constraint violations as [`ErrorKind::Conflict`] and every
/// other driver error as [`ErrorKind::Database`].
#[track_caller]
pub(crate) fn or_conflict<T>(result: std::result::Result<T, sqlx::Error>, what: &str) -> Result<T> {
    match result {
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            let detail = format!("{what} ({})", err.message());
            Err(sqlx::Error::Database(err)).or_raise(|| ErrorKind::Conflict(detail))
        },
        other => other.or_raise(|| ErrorKind::Database),
    }
}
