use crate::Context;
use crate::classify::build_manifest;
use crate::error::{ErrorKind, Result};
use crate::scan::ScanEvent;
use async_stream::stream;
use futures::Stream;
use std::collections::HashSet;
use time::UtcDateTime;
use tome_catalog::{DownloadId, Repository, StagedDownload};
use tome_storage::{BackendHandle, join_path};
use tracing::{debug, info, warn};

/// Streams one reconciliation pass over `ctx.staging`.
///
/// Refresh of every recorded download runs to completion before discovery
/// starts, so a directory that disappears and comes back within one pass
/// ends up as a fresh row. A download reserved by an association is
/// reported as [`ScanEvent::Skipped`] and not touched.
///
/// Per-entry failures are yielded as `Err` items without ending the stream.
/// A staging root that can't be listed ends discovery for this pass only;
/// the error is yielded and [`ScanEvent::Complete`] still follows.
pub fn scan<'a>(
    backend: &'a BackendHandle,
    repo: &'a Repository,
    ctx: &'a Context,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ScanEvent::Started);

        let recorded = match repo.list_downloads().await {
            Ok(recorded) => recorded,
            Err(e) => {
                yield Err(ErrorKind::catalog(e));
                yield Ok(ScanEvent::Complete);
                return;
            },
        };

        let mut known = HashSet::with_capacity(recorded.len());
        for (id, directory) in recorded {
            let result = refresh(backend, repo, ctx, id, &directory).await;
            if !matches!(result, Ok(ScanEvent::Removed { .. })) {
                known.insert(directory);
            }
            yield result;
        }

        match backend.list(&ctx.staging).await {
            Ok(entries) => {
                for entry in entries.into_iter().filter(|e| e.is_dir() && !known.contains(&e.name)) {
                    yield discover(backend, repo, ctx, entry.name).await;
                }
            },
            Err(e) => {
                warn!(staging = %ctx.staging.display(), "Could not list the staging directory, skipping discovery");
                yield Err(ErrorKind::storage(e));
            },
        }

        yield Ok(ScanEvent::Complete);
    })
}

async fn refresh(
    backend: &BackendHandle,
    repo: &Repository,
    ctx: &Context,
    id: DownloadId,
    directory: &str,
) -> Result<ScanEvent> {
    let directory_owned = || directory.to_string();
    let Some(_claim) = ctx.reservations.try_reserve(id) else {
        debug!(%id, directory, "Download is being associated, leaving it alone");
        return Ok(ScanEvent::Skipped { id, directory: directory_owned() });
    };
    let path = join_path(&ctx.staging, directory).map_err(ErrorKind::storage)?;
    if !backend.is_dir(&path).await.map_err(ErrorKind::storage)? {
        return match repo.delete_download(id).await.map_err(ErrorKind::catalog)? {
            true => {
                info!(%id, directory, "Staged directory vanished from disk, removed its download");
                Ok(ScanEvent::Removed { id, directory: directory_owned() })
            },
            // Deleted by an association that finished since the listing.
            false => Ok(ScanEvent::Skipped { id, directory: directory_owned() }),
        };
    }

    let files = build_manifest(backend, &ctx.staging, directory).await?;
    let Some(stored) = repo.get_download(id).await.map_err(ErrorKind::catalog)? else {
        return Ok(ScanEvent::Skipped { id, directory: directory_owned() });
    };
    if stored.files == files {
        return Ok(ScanEvent::Unchanged { id, directory: directory_owned() });
    }
    repo.update_download_manifest(id, &files).await.map_err(ErrorKind::catalog)?;
    debug!(%id, directory, "Refreshed download manifest");
    Ok(ScanEvent::Refreshed { id, directory: directory_owned() })
}

async fn discover(backend: &BackendHandle, repo: &Repository, ctx: &Context, directory: String) -> Result<ScanEvent> {
    let files = build_manifest(backend, &ctx.staging, &directory).await?;
    let download = StagedDownload {
        id: DownloadId::generate(),
        directory,
        files,
        created_at: UtcDateTime::now(),
    };
    repo.insert_download(&download).await.map_err(ErrorKind::catalog)?;
    info!(id = %download.id, directory = %download.directory, "Discovered new download");
    Ok(ScanEvent::Discovered { id: download.id, directory: download.directory })
}
