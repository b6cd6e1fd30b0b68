//! Filesystem adapter for the media library.
//!
//! The core never touches `std::fs` or `tokio::fs` directly: it lists
//! directories, checks existence, creates directories, renames bundles and
//! writes sidecar files through a [`StorageBackend`]. The local backend is
//! what runs in production; the mock backend (feature `mock`) keeps an
//! in-memory tree and can be told to fail specific operations.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::{Entry, EntryKind};
pub use crate::path::{join as join_path, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
