//! Path validation for names that come from outside the filesystem.
//!
//! Staging directory names are read back from the database, author and
//! series names are typed in by users, and destination paths are rendered
//! from templates. None of them may be allowed to climb out of the root
//! they are joined onto.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalizes a relative path and ensures it never leaves its root.
///
/// Current-directory components, repeated separators and trailing
/// separators are dropped; `..` is resolved against the preceding
/// components and rejected if it would step above the root. Leading root
/// components are ignored, so `/Asimov` is treated as `Asimov`. Null bytes
/// and platform prefixes are rejected, as is anything that normalizes to an
/// empty path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tome_storage::validate_path;
/// assert!(validate_path("Asimov/Foundation/book1").is_ok());
/// assert!(validate_path("Asimov/../Herbert").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("Asimov/../../escape").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("Asimov//./Foundation/").unwrap(),
///     Path::new("Asimov/Foundation")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Validates `relative` and joins it onto the absolute `root`.
///
/// ```
/// use std::path::Path;
/// use tome_storage::join_path;
/// let joined = join_path("/srv/library", "Asimov/./book1").unwrap();
/// assert_eq!(joined, Path::new("/srv/library/Asimov/book1"));
/// assert!(join_path("/srv/library", "../downloads").is_err());
/// assert!(join_path("relative/root", "book1").is_err());
/// ```
pub fn join(root: impl AsRef<Path>, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    if !root.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(root.to_path_buf()));
    }
    Ok(root.join(validate(relative)?))
}
