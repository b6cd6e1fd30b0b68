//! File classification and manifest building.
//!
//! A bundle's files are sorted into audio, text and images by extension
//! alone; nothing is opened or sniffed. Files with any other extension are
//! left out of the manifest (they stay in the directory and travel with it).

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tome_catalog::Manifest;
use tome_storage::{BackendHandle, join_path};

const AUDIO: &[&str] = &["m4b", "aax", "mp3", "aa", "wma", "flac", "wav", "daisy"];
const IMAGE: &[&str] = &["png", "jpg", "jpeg"];
const TEXT: &[&str] = &[
    "epub", "pdf", "azw3", "kfx", "azw", "mobi", "iba", "lrf", "lrx", "fb2", "djvu", "lit", "prc", "pdb", "cbz", "cbr",
    "txt", "rtf", "html", "docx",
];

/// What a file in a bundle is, judging by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Text,
    Image,
    Other,
}

impl MediaKind {
    /// Case-insensitive extension lookup. No extension is [`Other`](Self::Other).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) else {
            return Self::Other;
        };
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if AUDIO.contains(&ext) {
            Self::Audio
        } else if TEXT.contains(&ext) {
            Self::Text
        } else if IMAGE.contains(&ext) {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// Choose a cover from image names in listing order.
///
/// A single image is the cover. With several, the first whose name contains
/// "cover" (in any case) wins, otherwise the first one listed.
pub fn pick_cover<S: AsRef<str>>(images: &[S]) -> Option<&S> {
    match images {
        [] => None,
        [only] => Some(only),
        [first, ..] => {
            Some(images.iter().find(|name| name.as_ref().to_lowercase().contains("cover")).unwrap_or(first))
        },
    }
}

/// List and classify the regular files directly inside
/// `<staging>/<directory>`.
///
/// Paths in the manifest are staging-relative (`<directory>/<file>`) and
/// keep the backend's name order. Subdirectories aren't descended into.
pub async fn build_manifest(backend: &BackendHandle, staging: &Path, directory: &str) -> Result<Manifest> {
    let dir = join_path(staging, directory).map_err(ErrorKind::storage)?;
    let entries = backend.list(&dir).await.map_err(ErrorKind::storage)?;
    let mut manifest = Manifest::default();
    let mut images = Vec::new();
    for entry in entries.into_iter().filter(|e| e.is_file()) {
        let relative = PathBuf::from(directory).join(&entry.name);
        match MediaKind::from_path(&entry.name) {
            MediaKind::Audio => manifest.audio.push(relative),
            MediaKind::Text => manifest.text.push(relative),
            MediaKind::Image => images.push(entry.name),
            MediaKind::Other => {},
        }
    }
    manifest.cover = pick_cover(&images).map(|name| PathBuf::from(directory).join(name));
    Ok(manifest)
}
