//! JSON shapes of the text columns that hold lists.

use crate::error::{Error, ErrorKind};
use exn::OptionExt;
use std::path::{Path, PathBuf};

/// A stored file list: a plain JSON array of relative paths.
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[facet(transparent)]
pub(crate) struct PathListProxy(Vec<String>);
impl TryFrom<&[PathBuf]> for PathListProxy {
    type Error = Error;
    fn try_from(paths: &[PathBuf]) -> Result<Self, Self::Error> {
        paths
            .iter()
            .map(|p| path_to_string(p))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}
impl From<PathListProxy> for Vec<PathBuf> {
    fn from(list: PathListProxy) -> Self {
        list.0.into_iter().map(PathBuf::from).collect()
    }
}

/// Free-text tags on a book.
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[facet(transparent)]
pub(crate) struct TagsProxy(Vec<String>);
impl From<&[String]> for TagsProxy {
    fn from(tags: &[String]) -> Self {
        Self(tags.to_vec())
    }
}
impl From<TagsProxy> for Vec<String> {
    fn from(tags: TagsProxy) -> Self {
        tags.0
    }
}

/// SQLite text columns only take UTF-8.
pub(crate) fn path_to_string(path: &Path) -> Result<String, Error> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}
