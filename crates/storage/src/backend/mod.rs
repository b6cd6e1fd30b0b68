//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait: the handful of filesystem
//! operations the library needs to reconcile a staging directory and move
//! bundles into the library tree.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, Operation};
use crate::error::Result;
use crate::models::Entry;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for filesystem operations.
///
/// # Path Handling
/// Every path is absolute. Names that originate outside the filesystem
/// (database rows, user input, templates) must be joined onto their root
/// with [`join_path`](crate::join_path) first; implementations reject
/// relative paths with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tome_storage::{StorageBackend, error::Result};
///
/// async fn bundle_names(backend: &dyn StorageBackend) -> Result<Vec<String>> {
///     let entries = backend.list(Path::new("/srv/media/downloads")).await?;
///     Ok(entries.into_iter().filter(|e| e.is_dir()).map(|e| e.name).collect())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend (used for logging only).
    fn name(&self) -> &str;

    /// List the immediate children of a directory, sorted by name.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// directory does not exist. Entries that are neither regular files nor
    /// directories (sockets, broken symlinks, ...) are left out.
    async fn list(&self, dir: &Path) -> Result<Vec<Entry>>;

    /// Check if anything exists at the path.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Check if a directory exists at the path (`false` when absent).
    async fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Create a single directory.
    ///
    /// The parent must already exist. A directory already present at the
    /// path is success; a file there is
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
    async fn create_dir(&self, path: &Path) -> Result<()>;

    /// Atomically rename a file or directory.
    ///
    /// # Notes
    /// - Never replaces anything: if `to` exists the result is
    ///   [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
    /// - The parent of `to` must already exist.
    /// - Renames across devices fail with
    ///   [`CrossDevice`](crate::error::ErrorKind::CrossDevice); there is no
    ///   copy-then-delete fallback.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use tome_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.rename(
    ///     Path::new("/srv/media/downloads/book1"),
    ///     Path::new("/srv/media/library/Asimov/book1"),
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create or overwrite a regular file. The parent must already exist.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}
