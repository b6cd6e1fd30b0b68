//! Local filesystem storage backend.
//!
//! Accesses the filesystem via `tokio::fs` for async I/O. Paths are taken
//! as given (absolute); there is no root of its own, since a single backend
//! serves both the staging directory and the library tree so that bundles
//! can be renamed from one to the other.

use crate::error::{ErrorKind, Result};
use crate::models::{Entry, EntryKind};
use crate::StorageBackend;
use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tokio::fs;

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use tome_storage::backend::LocalBackend;
///
/// let backend = LocalBackend::new("local");
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
}
impl LocalBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn require_absolute(path: &Path) -> Result<()> {
        if !path.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
        }
        Ok(())
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            IoErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            IoErrorKind::CrossesDevices => ErrorKind::CrossDevice(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Follows symlinks; a dangling link or a special file yields `None`.
    async fn entry_kind(path: &Path) -> Result<Option<EntryKind>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, path)),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, dir: &Path) -> Result<Vec<Entry>> {
        Self::require_absolute(dir)?;
        let mut reader = fs::read_dir(dir).await.map_err(|e| Self::map_io_error(e, dir))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| Self::map_io_error(e, dir))? {
            let path = entry.path();
            let Some(kind) = Self::entry_kind(&path).await? else {
                continue;
            };
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %path.display(), "Skipping entry with a non UTF-8 name");
                continue;
            };
            entries.push(Entry::new(name, path, kind));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Self::require_absolute(path)?;
        Ok(fs::try_exists(path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        Self::require_absolute(path)?;
        Ok(Self::entry_kind(path).await? == Some(EntryKind::Directory))
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        Self::require_absolute(path)?;
        match fs::create_dir(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => match self.is_dir(path).await? {
                true => Ok(()),
                false => exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf())),
            },
            Err(e) => exn::bail!(Self::map_io_error(e, path)),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Self::require_absolute(from)?;
        Self::require_absolute(to)?;
        // rename(2) silently replaces an empty destination directory.
        if self.exists(to).await? {
            exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf()));
        }
        Ok(fs::rename(from, to).await.map_err(|e| match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(from.to_path_buf()),
            _ => Self::map_io_error(e, to),
        })?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        Self::require_absolute(path)?;
        Ok(fs::write(path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }
}
