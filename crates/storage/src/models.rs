//! Directory listing models.

use std::path::PathBuf;

/// What kind of filesystem object a listed [`Entry`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Final path component (the file or directory name).
    pub name: String,
    /// Absolute path of the entry.
    pub path: PathBuf,
    pub kind: EntryKind,
}
impl Entry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self { name: name.into(), path: path.into(), kind }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}
