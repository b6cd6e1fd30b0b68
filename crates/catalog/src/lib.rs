//! SQLite catalog for the media library.
//!
//! The catalog records two kinds of entity:
//! - **Staged downloads**: bundle directories sitting in the staging root,
//!   with the audio and text files found inside them. Rows are created,
//!   refreshed and removed by the scanner.
//! - **Books**: bibliographic entries with ordered author, series, genre and
//!   narrator lists. Once a download is associated, a book also records
//!   where its files live in the library.
//!
//! The database is the source of truth for books; staged downloads mirror
//! the staging directory and are rebuilt by the next scan if lost.

mod db;
pub mod error;
mod models;
mod repo;
mod transaction;

pub use crate::db::Database;
pub use crate::models::{
    Book, BookFields, BookId, BookPatch, Category, CategoryId, CategoryKind, Classification, DownloadId, Link,
    Manifest, StagedDownload,
};
pub use crate::repo::Repository;
pub use crate::transaction::Transaction;
