//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or directory does not exist
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Something already occupies the path (for operations that require a free path)
    #[display("already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Rename source and destination live on different devices.
    #[display("cannot rename across filesystem devices: {}", _0.display())]
    CrossDevice(#[error(not(source))] PathBuf),
    /// Path is relative where an absolute one is required, or escapes its root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}
