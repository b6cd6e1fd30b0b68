//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{Entry, EntryKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;

/// Backend operations that can be made to fail with [`MockBackend::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Exists,
    CreateDir,
    Rename,
    Write,
}

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(Vec<u8>),
}

/// In-memory storage backend for testing.
///
/// Holds a tree of absolute paths behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ancestors of
/// every seeded path are created implicitly.
///
/// # Examples
///
/// ```ignore
/// use tome_storage::backend::{MockBackend, Operation};
/// use tome_storage::StorageBackend;
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::with_files([("/downloads/book1/a.m4b", b"audio")])
///     .with_dirs(["/library"])
///     .fail_on(Operation::Rename, "/downloads/book1");
/// assert!(backend.is_dir(Path::new("/downloads/book1")).await.unwrap());
/// assert!(backend
///     .rename(Path::new("/downloads/book1"), Path::new("/library/book1"))
///     .await
///     .is_err());
/// # }
/// ```
pub struct MockBackend {
    name: String,
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    failures: Mutex<HashSet<(Operation, PathBuf)>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path is relative. If test setup is wrong, then test
    /// should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Directory);
        for (path, data) in files {
            let path = Self::seed_path(path.into());
            Self::seed_ancestors(&mut nodes, &path);
            nodes.insert(path, Node::File(data.into()));
        }
        Self {
            name: "mock".to_string(),
            nodes: RwLock::new(nodes),
            failures: Mutex::new(HashSet::new()),
        }
    }

    /// Add (possibly empty) directories to the tree.
    pub fn with_dirs(self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        {
            // Not shared yet, so the lock is always free.
            let mut nodes = self.nodes.try_write().unwrap_or_else(|_| panic!("MockBackend is already in use"));
            for dir in dirs {
                let dir = Self::seed_path(dir.into());
                Self::seed_ancestors(&mut nodes, &dir);
                nodes.insert(dir, Node::Directory);
            }
        }
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make `operation` fail with an I/O error whenever it targets `path`.
    ///
    /// Renames are matched on their source path.
    pub fn fail_on(self, operation: Operation, path: impl Into<PathBuf>) -> Self {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).insert((operation, path.into()));
        self
    }

    /// Contents of the file at `path`, if there is one.
    pub async fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.read().await.get(path.as_ref()) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    fn seed_path(path: PathBuf) -> PathBuf {
        if !path.is_absolute() {
            // The panic here is DELIBERATE. MockBackend is intended to be
            // used in tests; panics are expected. There is no error result.
            panic!("MockBackend: seeded path must be absolute: {}", path.display());
        }
        path
    }

    fn seed_ancestors(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Directory);
        }
    }

    fn check(&self, operation: Operation, path: &Path) -> Result<()> {
        if !path.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
        }
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if failures.contains(&(operation, path.to_path_buf())) {
            let err = IoError::new(IoErrorKind::Other, format!("injected {operation:?} failure"));
            exn::bail!(ErrorKind::Io(err));
        }
        Ok(())
    }

    fn require_parent(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or(path);
        match nodes.get(parent) {
            Some(Node::Directory) => Ok(()),
            _ => exn::bail!(ErrorKind::NotFound(parent.to_path_buf())),
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, dir: &Path) -> Result<Vec<Entry>> {
        self.check(Operation::List, dir)?;
        let nodes = self.nodes.read().await;
        if !matches!(nodes.get(dir), Some(Node::Directory)) {
            exn::bail!(ErrorKind::NotFound(dir.to_path_buf()));
        }
        let mut entries: Vec<Entry> = nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter_map(|(path, node)| {
                let name = path.file_name()?.to_str()?.to_string();
                let kind = match node {
                    Node::Directory => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                };
                Some(Entry::new(name, path.clone(), kind))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.check(Operation::Exists, path)?;
        Ok(self.nodes.read().await.contains_key(path))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        self.check(Operation::Exists, path)?;
        Ok(matches!(self.nodes.read().await.get(path), Some(Node::Directory)))
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        self.check(Operation::CreateDir, path)?;
        let mut nodes = self.nodes.write().await;
        match nodes.get(path) {
            Some(Node::Directory) => Ok(()),
            Some(Node::File(_)) => exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf())),
            None => {
                Self::require_parent(&nodes, path)?;
                nodes.insert(path.to_path_buf(), Node::Directory);
                Ok(())
            },
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check(Operation::Rename, from)?;
        if !to.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(to.to_path_buf()));
        }
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(from) {
            exn::bail!(ErrorKind::NotFound(from.to_path_buf()));
        }
        if nodes.contains_key(to) {
            exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf()));
        }
        Self::require_parent(&nodes, to)?;
        let moved: Vec<PathBuf> = nodes.keys().filter(|path| path.starts_with(from)).cloned().collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                // Infallible: every key in `moved` starts with `from`.
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = match suffix.as_os_str().is_empty() {
                    true => to.to_path_buf(),
                    false => to.join(suffix),
                };
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.check(Operation::Write, path)?;
        let mut nodes = self.nodes.write().await;
        if matches!(nodes.get(path), Some(Node::Directory)) {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        Self::require_parent(&nodes, path)?;
        nodes.insert(path.to_path_buf(), Node::File(data.to_vec()));
        Ok(())
    }
}
