//! Read access and single-statement writes outside of a transaction.
//!
//! Everything the scanner needs goes through [`Repository`] directly: each
//! of its writes touches one row, so it is atomic on its own. Multi-row
//! changes to a book (create, update, association) go through a
//! [`Transaction`] from [`Repository::begin`].

use crate::Database;
use crate::error::{ErrorKind, Result, or_conflict};
use crate::models::{
    Book, BookId, BookRow, Category, CategoryKind, CategoryRow, Classification, DownloadId, DownloadRow, LinkRow,
    Manifest, ManifestColumns, StagedDownload,
};
use crate::transaction::Transaction;
use exn::ResultExt;
use sqlx::SqlitePool;

/// Entry point for catalog queries.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a transaction; dropping it without committing rolls back.
    pub async fn begin(&self) -> Result<Transaction> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(Transaction::new(tx))
    }

    // =========================================================================
    // Staged downloads
    // =========================================================================

    /// Every staged download as `(id, directory)`, ordered by directory.
    pub async fn list_downloads(&self) -> Result<Vec<(DownloadId, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../queries/list_downloads.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(id, directory)| {
                let id = id.parse::<DownloadId>().or_raise(|| ErrorKind::InvalidData("download id"))?;
                Ok((id, directory))
            })
            .collect()
    }

    /// Every staged download with its manifest, ordered by directory.
    pub async fn list_staged(&self) -> Result<Vec<StagedDownload>> {
        let rows: Vec<DownloadRow> = sqlx::query_as(include_str!("../queries/list_staged_downloads.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(StagedDownload::try_from).collect()
    }

    pub async fn get_download(&self, id: DownloadId) -> Result<Option<StagedDownload>> {
        let row: Option<DownloadRow> = sqlx::query_as(include_str!("../queries/select_download.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(StagedDownload::try_from).transpose()
    }

    /// Returns [`ErrorKind::Conflict`] if the id or the directory is already
    /// recorded.
    pub async fn insert_download(&self, download: &StagedDownload) -> Result<()> {
        let row = DownloadRow::try_from(download)?;
        let result = sqlx::query(include_str!("../queries/insert_download.sql"))
            .bind(row.id)
            .bind(row.directory)
            .bind(row.audio_files)
            .bind(row.text_files)
            .bind(row.cover)
            .bind(row.created_at)
            .execute(&self.pool)
            .await;
        or_conflict(result, &format!("download directory {:?}", download.directory))?;
        Ok(())
    }

    /// Replace the file manifest of a staged download.
    ///
    /// Returns `false` if the row no longer exists.
    pub async fn update_download_manifest(&self, id: DownloadId, files: &Manifest) -> Result<bool> {
        let columns = ManifestColumns::try_from(files)?;
        let result = sqlx::query(include_str!("../queries/update_download_manifest.sql"))
            .bind(columns.audio_files)
            .bind(columns.text_files)
            .bind(columns.cover)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if the row was already gone.
    pub async fn delete_download(&self, id: DownloadId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_download.sql"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Books
    // =========================================================================

    /// A book with its four classification lists, each in rank order.
    pub async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../queries/select_book.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let links = self.book_links(id).await?;
        Ok(Some(Book::try_from(row)?.with_classifications(links)))
    }

    /// Every book with its classification lists, ordered by title.
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../queries/list_books.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            let book = Book::try_from(row)?;
            let links = self.book_links(book.id).await?;
            books.push(book.with_classifications(links));
        }
        Ok(books)
    }

    async fn book_links(&self, id: BookId) -> Result<Vec<Classification>> {
        let links: Vec<LinkRow> = sqlx::query_as(include_str!("../queries/select_book_links.sql"))
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        links.into_iter().map(Classification::try_from).collect()
    }

    pub async fn book_exists(&self, id: BookId) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/book_exists.sql"))
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Every category of one kind, ordered by name.
    pub async fn list_categories(&self, kind: CategoryKind) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(include_str!("../queries/list_categories.sql"))
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Category::try_from).collect()
    }
}
