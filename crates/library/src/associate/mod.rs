//! Moving a staged bundle into the library and linking it to a book.
//!
//! The move and the catalog write can't share a transaction, so the
//! workflow is a saga with a fixed order:
//! 1. **Do**: rename the bundle directory into the library tree.
//! 2. **Commit**: in one catalog transaction, point the book at its new
//!    files and delete the staged download row.
//! 3. **Compensate**: if the commit fails, rename the directory back.
//!
//! It is never commit-then-move. A failed compensation is the one state
//! that needs a human and is reported as [`ErrorKind::Stranded`].

mod sidecar;

use crate::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::template::{Destination, UNKNOWN_AUTHOR};
use exn::OptionExt;
use std::path::{Path, PathBuf};
use tome_catalog::{Book, BookId, CategoryKind, DownloadId, Repository, StagedDownload};
use tome_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use tome_storage::{BackendHandle, join_path};
use tracing::{error, info, instrument, warn};

/// A completed association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub book: BookId,
    /// Absolute path the bundle was staged at.
    pub from: PathBuf,
    /// Absolute path the bundle lives at now.
    pub to: PathBuf,
    /// Whether `metadata.json` was written.
    pub sidecar: bool,
}

/// Outcome of undoing a move.
#[derive(Debug)]
pub enum Compensation {
    /// The bundle is back where it was staged.
    Restored,
    /// Moving it back failed too; the bundle is still in the library tree.
    Stranded(StorageError),
}

/// A rename that has happened and may still need undoing.
struct Move<'a> {
    backend: &'a BackendHandle,
    from: PathBuf,
    to: PathBuf,
}

impl<'a> Move<'a> {
    async fn perform(backend: &'a BackendHandle, from: PathBuf, to: PathBuf) -> Result<Self> {
        backend.rename(&from, &to).await.map_err(|err| match &*err {
            StorageErrorKind::NotFound(path) if *path == from => {
                let what = format!("staged directory {}", from.display());
                err.raise(ErrorKind::NotFound(what))
            },
            _ => ErrorKind::storage(err),
        })?;
        Ok(Self { backend, from, to })
    }

    async fn compensate(&self) -> Compensation {
        match self.backend.rename(&self.to, &self.from).await {
            Ok(()) => Compensation::Restored,
            Err(err) => Compensation::Stranded(err),
        }
    }

    /// Turn a failed commit into the error the caller sees, after trying
    /// to put the bundle back.
    async fn abort(self, cause: Error) -> Error {
        match self.compensate().await {
            Compensation::Restored => {
                warn!(from = %self.from.display(), to = %self.to.display(), error = ?cause, "Linking failed, moved files back to staging");
                cause.raise(ErrorKind::Compensated)
            },
            Compensation::Stranded(rename_error) => {
                error!(
                    from = %self.from.display(),
                    to = %self.to.display(),
                    error = ?cause,
                    rename_error = ?rename_error,
                    "Files stranded in the library tree and not linked in the catalog, manual intervention required"
                );
                cause.raise(ErrorKind::Stranded { from: self.from, to: self.to })
            },
        }
    }
}

/// Move the staged download `download` into the library and link it to
/// `book`.
///
/// Both must exist before anything is touched; either missing is
/// [`ErrorKind::NotFound`]. The scanner leaves the download alone for the
/// whole call, and a concurrent association of the same download is
/// [`ErrorKind::Conflict`]. The destination is rendered from
/// [`Context::template`] using the book's rank 0 author (`Unknown` if it has
/// none) and rank 0 series; missing directories above it are created.
///
/// If linking fails after the move, the bundle is moved back and the error
/// is [`ErrorKind::Compensated`]; if that fails as well it is
/// [`ErrorKind::Stranded`]. On success a `metadata.json` sidecar is written
/// when enabled; failing to write it is only logged.
#[instrument(skip_all, fields(download = %download, book = %book))]
pub async fn associate(
    backend: &BackendHandle,
    repo: &Repository,
    ctx: &Context,
    download: DownloadId,
    book: BookId,
) -> Result<Association> {
    let Some(_claim) = ctx.reservations.try_reserve(download) else {
        exn::bail!(ErrorKind::Conflict(format!("staged download {download} is already being associated")));
    };
    let staged = repo
        .get_download(download)
        .await
        .map_err(ErrorKind::catalog)?
        .ok_or_raise(|| ErrorKind::NotFound(format!("staged download {download}")))?;
    let record = repo
        .get_book(book)
        .await
        .map_err(ErrorKind::catalog)?
        .ok_or_raise(|| ErrorKind::NotFound(format!("book {book}")))?;

    let relative = destination(ctx, &record, &staged)?;
    let from = join_path(&ctx.staging, &staged.directory).map_err(ErrorKind::storage)?;
    let to = ctx.library.join(&relative);
    // The row can outlive its directory until the next scan removes it.
    if !backend.is_dir(&from).await.map_err(ErrorKind::storage)? {
        exn::bail!(ErrorKind::NotFound(format!("staged directory {}", from.display())));
    }
    create_parents(backend, &ctx.library, &relative).await?;

    let moved = Move::perform(backend, from, to).await?;
    if let Err(cause) = link(repo, &staged, book, &relative).await {
        return Err(moved.abort(cause).await);
    }
    info!(from = %moved.from.display(), to = %moved.to.display(), "Associated download with book");

    let sidecar = ctx.sidecar && write_sidecar(backend, repo, book, &moved.to).await;
    Ok(Association { book, from: moved.from, to: moved.to, sidecar })
}

/// Library-relative directory the bundle moves to.
fn destination(ctx: &Context, book: &Book, staged: &StagedDownload) -> Result<PathBuf> {
    let author = book.primary(CategoryKind::Author).map(|c| c.category.name.as_str());
    let series = book.primary(CategoryKind::Series);
    ctx.template.generate(&Destination {
        author: author.filter(|name| !name.trim().is_empty()).unwrap_or(UNKNOWN_AUTHOR),
        series: series.map(|c| c.category.name.as_str()).unwrap_or_default(),
        volume: series.and_then(|c| c.volume.as_deref()).unwrap_or_default(),
        title: &book.title,
        directory: &staged.directory,
    })
}

/// Create each missing directory between the library root and the
/// destination, one level at a time. Existing ones are fine.
async fn create_parents(backend: &BackendHandle, library: &Path, relative: &Path) -> Result<()> {
    let Some(parents) = relative.parent() else {
        return Ok(());
    };
    let mut dir = library.to_path_buf();
    for component in parents.components() {
        dir.push(component);
        backend.create_dir(&dir).await.map_err(ErrorKind::storage)?;
    }
    Ok(())
}

/// Point the book at its new files and drop the staged row, atomically.
async fn link(repo: &Repository, staged: &StagedDownload, book: BookId, root: &Path) -> Result<()> {
    let files = staged.files.rebase(Path::new(&staged.directory), root);
    let mut tx = repo.begin().await.map_err(ErrorKind::catalog)?;
    if !tx.link_book_files(book, root, &files).await.map_err(ErrorKind::catalog)? {
        tx.rollback().await.map_err(ErrorKind::catalog)?;
        exn::bail!(ErrorKind::NotFound(format!("book {book}")));
    }
    if !tx.delete_download(staged.id).await.map_err(ErrorKind::catalog)? {
        tx.rollback().await.map_err(ErrorKind::catalog)?;
        exn::bail!(ErrorKind::NotFound(format!("staged download {}", staged.id)));
    }
    tx.commit().await.map_err(ErrorKind::catalog)
}

/// Best effort: returns whether the sidecar was written.
async fn write_sidecar(backend: &BackendHandle, repo: &Repository, book: BookId, dir: &Path) -> bool {
    let result = async {
        let record = repo
            .get_book(book)
            .await
            .map_err(ErrorKind::catalog)?
            .ok_or_raise(|| ErrorKind::NotFound(format!("book {book}")))?;
        let bytes = sidecar::Sidecar::from(&record).to_bytes()?;
        backend.write(&dir.join(sidecar::FILE_NAME), &bytes).await.map_err(ErrorKind::storage)
    };
    match result.await {
        Ok(()) => true,
        Err(err) => {
            warn!(dir = %dir.display(), error = ?err, "Could not write metadata sidecar");
            false
        },
    }
}

#[cfg(test)]
mod tests;
