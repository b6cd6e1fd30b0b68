//! Book creation and editing, with each classification list reconciled in
//! the same transaction as the field write.

use crate::error::{ErrorKind, Result};
use crate::reconcile::{Desired, reconcile};
use exn::OptionExt;
use tome_catalog::{Book, BookFields, BookId, BookPatch, Category, CategoryKind, Repository, Transaction};
use tracing::{info, instrument};

/// A book to create, with its ordered classification lists.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub fields: BookFields,
    pub authors: Vec<Desired>,
    pub series: Vec<Desired>,
    pub genres: Vec<Desired>,
    pub narrators: Vec<Desired>,
}

/// Changes to an existing book.
///
/// A `None` list leaves that classification untouched; `Some(vec![])`
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
    pub patch: BookPatch,
    pub authors: Option<Vec<Desired>>,
    pub series: Option<Vec<Desired>>,
    pub genres: Option<Vec<Desired>>,
    pub narrators: Option<Vec<Desired>>,
}

impl BookUpdate {
    fn lists(&self) -> [(CategoryKind, Option<&[Desired]>); 4] {
        [
            (CategoryKind::Author, self.authors.as_deref()),
            (CategoryKind::Series, self.series.as_deref()),
            (CategoryKind::Genre, self.genres.as_deref()),
            (CategoryKind::Narrator, self.narrators.as_deref()),
        ]
    }
}

/// Create a book and its classification links in one transaction.
///
/// Any failure (a duplicate ISBN, an unknown category id) leaves nothing
/// behind, including categories created for earlier lists.
#[instrument(skip_all, fields(title = %book.fields.title))]
pub async fn create_book(repo: &Repository, book: NewBook) -> Result<Book> {
    let mut tx = repo.begin().await.map_err(ErrorKind::catalog)?;
    let id = tx.insert_book(&book.fields).await.map_err(ErrorKind::catalog)?;
    let lists = [
        (CategoryKind::Author, book.authors.as_slice()),
        (CategoryKind::Series, book.series.as_slice()),
        (CategoryKind::Genre, book.genres.as_slice()),
        (CategoryKind::Narrator, book.narrators.as_slice()),
    ];
    for (kind, desired) in lists {
        if !desired.is_empty() {
            reconcile(&mut tx, id, kind, desired).await?;
        }
    }
    tx.commit().await.map_err(ErrorKind::catalog)?;
    info!(book = %id, "Created book");
    reload(repo, id).await
}

/// Apply `update` to book `id` in one transaction.
#[instrument(skip_all, fields(book = %id))]
pub async fn update_book(repo: &Repository, id: BookId, update: BookUpdate) -> Result<Book> {
    let mut tx = repo.begin().await.map_err(ErrorKind::catalog)?;
    require_book(&mut tx, id).await?;
    if update.patch != BookPatch::default() {
        tx.update_book(id, &update.patch).await.map_err(ErrorKind::catalog)?;
    }
    for (kind, desired) in update.lists() {
        if let Some(desired) = desired {
            reconcile(&mut tx, id, kind, desired).await?;
        }
    }
    tx.commit().await.map_err(ErrorKind::catalog)?;
    reload(repo, id).await
}

/// Add a category ahead of any book using it.
///
/// A name already taken for `kind` is [`ErrorKind::Conflict`].
#[instrument(skip(repo))]
pub async fn create_category(repo: &Repository, kind: CategoryKind, name: &str) -> Result<Category> {
    let name = name.trim();
    if name.is_empty() {
        exn::bail!(ErrorKind::Invalid(format!("{kind} name must not be blank")));
    }
    let mut tx = repo.begin().await.map_err(ErrorKind::catalog)?;
    let category = tx.insert_category(kind, name).await.map_err(ErrorKind::catalog)?;
    tx.commit().await.map_err(ErrorKind::catalog)?;
    info!(%kind, id = %category.id, name, "Created category");
    Ok(category)
}

async fn require_book(tx: &mut Transaction, id: BookId) -> Result<()> {
    match tx.book_exists(id).await.map_err(ErrorKind::catalog)? {
        true => Ok(()),
        false => exn::bail!(ErrorKind::NotFound(format!("book {id}"))),
    }
}

async fn reload(repo: &Repository, id: BookId) -> Result<Book> {
    repo.get_book(id)
        .await
        .map_err(ErrorKind::catalog)?
        .ok_or_raise(|| ErrorKind::NotFound(format!("book {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tome_catalog::{CategoryId, Database};

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn names(book: &Book, kind: CategoryKind) -> Vec<&str> {
        book.classifications(kind).iter().map(|c| c.category.name.as_str()).collect()
    }

    fn good_omens() -> NewBook {
        NewBook {
            fields: BookFields {
                title: "Good Omens".to_string(),
                isbn: Some("9780060853983".to_string()),
                ..Default::default()
            },
            authors: vec![Desired::name("Terry Pratchett"), Desired::name("Neil Gaiman")],
            narrators: vec![Desired::name("Martin Jarvis")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_book_with_lists() {
        let repo = repo().await;
        let book = create_book(&repo, good_omens()).await.unwrap();
        assert_eq!(book.title, "Good Omens");
        assert_eq!(names(&book, CategoryKind::Author), ["Terry Pratchett", "Neil Gaiman"]);
        assert_eq!(names(&book, CategoryKind::Narrator), ["Martin Jarvis"]);
        assert!(book.series.is_empty());
        assert_eq!(book.authors[1].rank, 1);
    }

    #[tokio::test]
    async fn test_duplicate_isbn_creates_nothing() {
        let repo = repo().await;
        create_book(&repo, good_omens()).await.unwrap();
        let mut again = good_omens();
        again.fields.title = "Good Omens (Again)".to_string();
        again.genres = vec![Desired::name("Comedy")];
        let err = create_book(&repo, again).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        assert!(repo.list_categories(CategoryKind::Genre).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_list_rolls_back_earlier_lists() {
        let repo = repo().await;
        let mut book = good_omens();
        book.genres = vec![Desired::id(CategoryId::from(42))];
        let err = create_book(&repo, book).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(repo.list_categories(CategoryKind::Author).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_leaves_unlisted_kinds_alone() {
        let repo = repo().await;
        let book = create_book(&repo, good_omens()).await.unwrap();
        let update = BookUpdate {
            patch: BookPatch { publish_year: Some(1990), ..Default::default() },
            authors: Some(vec![Desired::name("Neil Gaiman"), Desired::name("Terry Pratchett")]),
            narrators: Some(vec![]),
            ..Default::default()
        };
        let book = update_book(&repo, book.id, update).await.unwrap();
        assert_eq!(book.publish_year, Some(1990));
        assert_eq!(book.title, "Good Omens");
        assert_eq!(names(&book, CategoryKind::Author), ["Neil Gaiman", "Terry Pratchett"]);
        assert!(book.narrators.is_empty());
    }

    #[tokio::test]
    async fn test_update_series_volume() {
        let repo = repo().await;
        let book = create_book(&repo, good_omens()).await.unwrap();
        let update = BookUpdate { series: Some(vec![Desired::name("Standalone").with_volume("1")]), ..Default::default() };
        let book = update_book(&repo, book.id, update).await.unwrap();
        assert_eq!(book.series[0].volume.as_deref(), Some("1"));
        assert_eq!(names(&book, CategoryKind::Author).len(), 2);
    }

    #[tokio::test]
    async fn test_create_category_is_reused_by_name() {
        let repo = repo().await;
        let created = create_category(&repo, CategoryKind::Narrator, " Martin Jarvis ").await.unwrap();
        assert_eq!(created.name, "Martin Jarvis");
        let err = create_category(&repo, CategoryKind::Narrator, "Martin Jarvis").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));

        let book = create_book(&repo, good_omens()).await.unwrap();
        assert_eq!(book.narrators[0].category.id, created.id);
        assert_eq!(repo.list_categories(CategoryKind::Narrator).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_category_name() {
        let repo = repo().await;
        let err = create_category(&repo, CategoryKind::Genre, "  ").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
        assert!(err.is_client_error());
        assert!(repo.list_categories(CategoryKind::Genre).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_book() {
        let repo = repo().await;
        let err = update_book(&repo, BookId::generate(), BookUpdate::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
