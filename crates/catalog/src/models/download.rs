use crate::error::{Error, ErrorKind};
use crate::models::facet::{PathListProxy, path_to_string};
use crate::models::{DownloadId, Manifest};
use exn::ResultExt;
use facet_json::{from_str as from_json, to_string as to_json};
use std::path::PathBuf;
use time::UtcDateTime;

/// A bundle directory in the staging root that isn't linked to a book yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDownload {
    pub id: DownloadId,
    /// Name of the bundle directory, relative to the staging root.
    pub directory: String,
    /// Paths are staging-relative and include the directory name
    /// (`book1/a.m4b`).
    pub files: Manifest,
    pub created_at: UtcDateTime,
}

/// Column values for the three manifest columns shared by `downloads`
/// and `books`.
pub(crate) struct ManifestColumns {
    pub(crate) audio_files: String,
    pub(crate) text_files: String,
    pub(crate) cover: Option<String>,
}
impl TryFrom<&Manifest> for ManifestColumns {
    type Error = Error;
    fn try_from(manifest: &Manifest) -> Result<Self, Self::Error> {
        let audio = PathListProxy::try_from(manifest.audio.as_slice())?;
        let text = PathListProxy::try_from(manifest.text.as_slice())?;
        Ok(Self {
            audio_files: to_json(&audio).or_raise(|| ErrorKind::InvalidData("audio files"))?,
            text_files: to_json(&text).or_raise(|| ErrorKind::InvalidData("text files"))?,
            cover: manifest.cover.as_deref().map(path_to_string).transpose()?,
        })
    }
}
impl ManifestColumns {
    pub(crate) fn into_manifest(self) -> Result<Manifest, Error> {
        Ok(Manifest {
            audio: from_json::<PathListProxy>(&self.audio_files)
                .or_raise(|| ErrorKind::InvalidData("audio files"))?
                .into(),
            text: from_json::<PathListProxy>(&self.text_files)
                .or_raise(|| ErrorKind::InvalidData("text files"))?
                .into(),
            cover: self.cover.map(PathBuf::from),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DownloadRow {
    pub(crate) id: String,
    pub(crate) directory: String,
    pub(crate) audio_files: String,
    pub(crate) text_files: String,
    pub(crate) cover: Option<String>,
    pub(crate) created_at: i64,
}
impl TryFrom<&StagedDownload> for DownloadRow {
    type Error = Error;
    fn try_from(download: &StagedDownload) -> Result<Self, Self::Error> {
        let columns = ManifestColumns::try_from(&download.files)?;
        Ok(Self {
            id: download.id.to_string(),
            directory: download.directory.clone(),
            audio_files: columns.audio_files,
            text_files: columns.text_files,
            cover: columns.cover,
            created_at: download.created_at.unix_timestamp(),
        })
    }
}
impl TryFrom<DownloadRow> for StagedDownload {
    type Error = Error;
    fn try_from(row: DownloadRow) -> Result<Self, Self::Error> {
        let columns = ManifestColumns {
            audio_files: row.audio_files,
            text_files: row.text_files,
            cover: row.cover,
        };
        Ok(Self {
            id: row.id.parse::<DownloadId>().or_raise(|| ErrorKind::InvalidData("download id"))?,
            directory: row.directory,
            files: columns.into_manifest()?,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
        })
    }
}
