//! The media library core.
//!
//! - [`scan`] keeps staged download rows in step with the staging directory.
//! - [`associate`](associate::associate) moves a staged bundle into the
//!   library tree and links it to a book, moving it back if linking fails.
//! - [`reconcile`](reconcile::reconcile) rewrites a book's ordered author,
//!   series, genre or narrator list with as few writes as possible, and
//!   [`catalog`] drives it when books are created or updated.

pub mod associate;
pub mod catalog;
mod classify;
pub mod error;
pub mod reconcile;
mod reserve;
pub mod scan;
mod template;

pub use crate::classify::{MediaKind, build_manifest, pick_cover};
pub use crate::reserve::{Reservation, Reservations};
pub use crate::template::{DEFAULT_TEMPLATE, Destination, PathGenerator, UNKNOWN_AUTHOR};
use std::path::PathBuf;

/// Everything the scanner and the association workflow share.
#[derive(Debug)]
pub struct Context {
    /// Absolute staging root that downloads land in.
    pub staging: PathBuf,
    /// Absolute library root that associated bundles are moved under.
    pub library: PathBuf,
    /// Renders a bundle's library-relative destination.
    pub template: PathGenerator,
    /// Whether to write `metadata.json` next to associated files.
    pub sidecar: bool,
    pub reservations: Reservations,
}

impl Context {
    /// A context with the default destination template and sidecars on.
    pub fn new(staging: impl Into<PathBuf>, library: impl Into<PathBuf>) -> error::Result<Self> {
        Ok(Self {
            staging: staging.into(),
            library: library.into(),
            template: DEFAULT_TEMPLATE.parse()?,
            sidecar: true,
            reservations: Reservations::default(),
        })
    }

    pub fn with_template(mut self, template: PathGenerator) -> Self {
        self.template = template;
        self
    }

    pub fn with_sidecar(mut self, sidecar: bool) -> Self {
        self.sidecar = sidecar;
        self
    }
}
