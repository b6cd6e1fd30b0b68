//! Multi-statement writes that must land together or not at all.

use crate::error::{ErrorKind, Result, or_conflict};
use crate::models::{
    BookFields, BookId, BookPatch, Category, CategoryId, CategoryKind, CategoryRow, Classification, DownloadId, Link,
    LinkRow, Manifest, ManifestColumns, identifier, path_to_string, tags_json,
};
use exn::ResultExt;
use sqlx::Sqlite;
use std::path::Path;
use time::UtcDateTime;

/// An open catalog transaction.
///
/// Nothing written through it is visible to other connections until
/// [`commit`](Self::commit). Dropping it rolls back.
pub struct Transaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl Transaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Books
    // =========================================================================

    /// Insert a book without any files or classifications.
    ///
    /// Returns [`ErrorKind::Conflict`] if the ISBN or ASIN is already taken.
    pub async fn insert_book(&mut self, fields: &BookFields) -> Result<BookId> {
        let id = BookId::generate();
        let now = UtcDateTime::now().unix_timestamp();
        let result = sqlx::query(include_str!("../queries/insert_book.sql"))
            .bind(id.to_string())
            .bind(&fields.title)
            .bind(&fields.subtitle)
            .bind(&fields.description)
            .bind(fields.publish_year)
            .bind(identifier(&fields.isbn))
            .bind(identifier(&fields.asin))
            .bind(tags_json(&fields.tags)?)
            .bind(&fields.publisher)
            .bind(now)
            .bind(now)
            .execute(&mut *self.tx)
            .await;
        or_conflict(result, "book identifier")?;
        Ok(id)
    }

    /// Apply a partial update of the scalar fields.
    ///
    /// Returns `false` if the book doesn't exist.
    pub async fn update_book(&mut self, id: BookId, patch: &BookPatch) -> Result<bool> {
        let tags = patch.tags.as_deref().map(tags_json).transpose()?;
        let result = sqlx::query(include_str!("../queries/update_book.sql"))
            .bind(&patch.title)
            .bind(&patch.subtitle)
            .bind(&patch.description)
            .bind(patch.publish_year)
            .bind(identifier(&patch.isbn))
            .bind(identifier(&patch.asin))
            .bind(tags)
            .bind(&patch.publisher)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await;
        let result = or_conflict(result, "book identifier")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn book_exists(&mut self, id: BookId) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/book_exists.sql"))
            .bind(id.to_string())
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Record the library location of a book's files.
    ///
    /// `directory` and the manifest paths are library-relative. Returns
    /// `false` if the book doesn't exist.
    pub async fn link_book_files(&mut self, id: BookId, directory: &Path, files: &Manifest) -> Result<bool> {
        let columns = ManifestColumns::try_from(files)?;
        let result = sqlx::query(include_str!("../queries/link_book_files.sql"))
            .bind(path_to_string(directory)?)
            .bind(columns.audio_files)
            .bind(columns.text_files)
            .bind(columns.cover)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if the row was already gone.
    pub async fn delete_download(&mut self, id: DownloadId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_download.sql"))
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Look a category up by its exact name.
    pub async fn find_category(&mut self, kind: CategoryKind, name: &str) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(include_str!("../queries/select_category_by_name.sql"))
            .bind(kind.as_str())
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Category::try_from).transpose()
    }

    /// Look a category up by id; a category of another kind is `None`.
    pub async fn get_category(&mut self, kind: CategoryKind, id: CategoryId) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(include_str!("../queries/select_category.sql"))
            .bind(kind.as_str())
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Category::try_from).transpose()
    }

    /// Returns [`ErrorKind::Conflict`] if the name is taken for this kind.
    pub async fn insert_category(&mut self, kind: CategoryKind, name: &str) -> Result<Category> {
        let result = sqlx::query_as::<_, CategoryRow>(include_str!("../queries/insert_category.sql"))
            .bind(kind.as_str())
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await;
        let row = or_conflict(result, &format!("{kind} {name:?}"))?;
        tracing::debug!(%kind, id = row.id, name, "Created category");
        Category::try_from(row)
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// The book's current list for one kind, in rank order.
    pub async fn list_links(&mut self, book: BookId, kind: CategoryKind) -> Result<Vec<Classification>> {
        let rows: Vec<LinkRow> = sqlx::query_as(include_str!("../queries/select_links.sql"))
            .bind(book.to_string())
            .bind(kind.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Classification::try_from).collect()
    }

    /// Returns `false` if there was no such link.
    pub async fn unlink(&mut self, book: BookId, kind: CategoryKind, category: CategoryId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_link.sql"))
            .bind(book.to_string())
            .bind(category.get())
            .bind(kind.as_str())
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or update links so that each one's rank is its position in
    /// `links`.
    ///
    /// Links of this kind that aren't in `links` are left alone; unlink them
    /// first to keep ranks dense. A category of another kind is rejected by
    /// the schema.
    pub async fn write_links(&mut self, book: BookId, kind: CategoryKind, links: &[Link]) -> Result<()> {
        for (rank, link) in links.iter().enumerate() {
            let rank = i64::try_from(rank).or_raise(|| ErrorKind::InvalidData("rank"))?;
            let volume = link.volume.as_deref().filter(|_| kind.has_volume());
            sqlx::query(include_str!("../queries/upsert_link.sql"))
                .bind(book.to_string())
                .bind(link.category.get())
                .bind(kind.as_str())
                .bind(rank)
                .bind(volume)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }
}
