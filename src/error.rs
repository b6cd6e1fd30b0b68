//! Command Error Types
//!
//! Every failure is raised into one of these kinds, which decide the
//! process exit code.

use derive_more::{Display, Error};
use std::process::ExitCode;
use tome_catalog::error::{Error as CatalogError, ErrorKind as CatalogErrorKind};
use tome_library::error::Error as LibraryError;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration, logging or catalog setup failed.
    #[display("could not start")]
    Startup,
    /// The request named something missing or taken.
    #[display("request rejected")]
    Rejected,
    /// The id on the command line names nothing in the catalog.
    #[display("not found: {_0}")]
    Missing(#[error(not(source))] String),
    #[display("operation failed")]
    Failed,
    /// Files are out of place and only a human can put them back.
    #[display("manual intervention required")]
    Stranded,
}

impl ErrorKind {
    /// Raise a library error into the kind matching its severity.
    #[track_caller]
    pub fn library(err: LibraryError) -> Error {
        let kind = if err.needs_intervention() {
            Self::Stranded
        } else if err.is_client_error() {
            Self::Rejected
        } else {
            Self::Failed
        };
        err.raise(kind)
    }

    /// Raise a catalog read error; missing and duplicate rows are rejections.
    #[track_caller]
    pub fn catalog(err: CatalogError) -> Error {
        let kind = match &*err {
            CatalogErrorKind::NotFound(_) | CatalogErrorKind::Conflict(_) => Self::Rejected,
            _ => Self::Failed,
        };
        err.raise(kind)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Rejected | Self::Missing(_) => ExitCode::from(1),
            Self::Startup | Self::Failed => ExitCode::from(2),
            Self::Stranded => ExitCode::from(3),
        }
    }
}
