//! Minimal-write reconciliation of a book's ordered category lists.
//!
//! For one book and one [`CategoryKind`], the desired list is resolved to
//! category ids (creating categories named for the first time), diffed
//! against the stored links, and written back: links that are no longer
//! wanted are deleted, then every wanted link is upserted with its rank set
//! to its position. Ranks stay dense and 0-based whatever the previous
//! state was.
//!
//! Categories are shared between books and are never deleted here.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::collections::HashSet;
use tome_catalog::error::ErrorKind as CatalogErrorKind;
use tome_catalog::{BookId, Category, CategoryId, CategoryKind, Link, Transaction};
use tracing::{debug, instrument};

/// How a desired list element names its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    /// An existing category; unknown ids (or ids of another kind) are
    /// [`ErrorKind::NotFound`].
    Id(CategoryId),
    /// Find by exact name, creating the category if there is none.
    Name(String),
}

/// One element of a desired list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desired {
    pub target: CategoryRef,
    /// Volume index; kept for series only.
    pub volume: Option<String>,
}

impl Desired {
    pub fn id(id: CategoryId) -> Self {
        Self { target: CategoryRef::Id(id), volume: None }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self { target: CategoryRef::Name(name.into()), volume: None }
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }
}

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Categories that didn't exist before.
    pub created: Vec<Category>,
    /// Links deleted.
    pub removed: Vec<CategoryId>,
    /// Links that are new for this book.
    pub added: Vec<CategoryId>,
    /// Links kept, possibly at a new rank.
    pub unchanged: Vec<CategoryId>,
}

impl Reconciliation {
    /// `true` if no category or link was created or deleted.
    pub fn is_stable(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

/// Make `book`'s `kind` list match `desired`, in order.
///
/// Runs inside the caller's transaction; on error the caller must roll it
/// back (dropping it does). A category listed twice keeps its first
/// position. Blank names are ignored.
#[instrument(skip_all, fields(book = %book, kind = %kind))]
pub async fn reconcile(
    tx: &mut Transaction,
    book: BookId,
    kind: CategoryKind,
    desired: &[Desired],
) -> Result<Reconciliation> {
    let mut outcome = Reconciliation::default();

    let mut wanted: Vec<Link> = Vec::with_capacity(desired.len());
    let mut seen = HashSet::with_capacity(desired.len());
    for item in desired {
        let id = match &item.target {
            CategoryRef::Id(id) => {
                tx.get_category(kind, *id)
                    .await
                    .map_err(ErrorKind::catalog)?
                    .ok_or_raise(|| ErrorKind::NotFound(format!("{kind} {id}")))?
                    .id
            },
            CategoryRef::Name(name) if name.trim().is_empty() => continue,
            CategoryRef::Name(name) => find_or_create(tx, kind, name.trim(), &mut outcome.created).await?,
        };
        if seen.insert(id) {
            let volume = item.volume.clone().filter(|_| kind.has_volume());
            wanted.push(Link { category: id, volume });
        }
    }

    let current = tx.list_links(book, kind).await.map_err(ErrorKind::catalog)?;
    let linked: HashSet<CategoryId> = current.iter().map(|c| c.category.id).collect();
    outcome.removed = current.iter().map(|c| c.category.id).filter(|id| !seen.contains(id)).collect();
    for link in &wanted {
        match linked.contains(&link.category) {
            true => outcome.unchanged.push(link.category),
            false => outcome.added.push(link.category),
        }
    }

    for id in &outcome.removed {
        tx.unlink(book, kind, *id).await.map_err(ErrorKind::catalog)?;
    }
    tx.write_links(book, kind, &wanted).await.map_err(ErrorKind::catalog)?;

    debug!(
        created = outcome.created.len(),
        removed = outcome.removed.len(),
        added = outcome.added.len(),
        unchanged = outcome.unchanged.len(),
        "Reconciled categories"
    );
    Ok(outcome)
}

/// Exact-name lookup, creating on a miss.
///
/// A conflict on insert means another writer created the same name first,
/// so it is fetched again instead of failing.
async fn find_or_create(
    tx: &mut Transaction,
    kind: CategoryKind,
    name: &str,
    created: &mut Vec<Category>,
) -> Result<CategoryId> {
    if let Some(category) = tx.find_category(kind, name).await.map_err(ErrorKind::catalog)? {
        return Ok(category.id);
    }
    match tx.insert_category(kind, name).await {
        Ok(category) => {
            let id = category.id;
            created.push(category);
            Ok(id)
        },
        Err(err) if matches!(&*err, CatalogErrorKind::Conflict(_)) => {
            let category = tx.find_category(kind, name).await.map_err(ErrorKind::catalog)?;
            match category {
                Some(category) => Ok(category.id),
                None => Err(ErrorKind::catalog(err)),
            }
        },
        Err(err) => Err(ErrorKind::catalog(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tome_catalog::{BookFields, Database, Repository};

    async fn setup() -> (Repository, Transaction, BookId) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let mut tx = repo.begin().await.unwrap();
        let book = tx.insert_book(&BookFields { title: "Good Omens".to_string(), ..Default::default() }).await.unwrap();
        (repo, tx, book)
    }

    async fn names(tx: &mut Transaction, book: BookId, kind: CategoryKind) -> Vec<(String, u32)> {
        let links = tx.list_links(book, kind).await.unwrap();
        links.into_iter().map(|c| (c.category.name, c.rank)).collect()
    }

    #[tokio::test]
    async fn test_reorder_remove_and_create() {
        let (_repo, mut tx, book) = setup().await;
        let a = tx.insert_category(CategoryKind::Author, "A").await.unwrap();
        let b = tx.insert_category(CategoryKind::Author, "B").await.unwrap();
        reconcile(&mut tx, book, CategoryKind::Author, &[Desired::id(a.id), Desired::id(b.id)]).await.unwrap();

        let desired = [Desired::id(b.id), Desired::name("C")];
        let outcome = reconcile(&mut tx, book, CategoryKind::Author, &desired).await.unwrap();
        assert_eq!(outcome.removed, [a.id]);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].name, "C");
        assert_eq!(outcome.added, [outcome.created[0].id]);
        assert_eq!(outcome.unchanged, [b.id]);
        assert_eq!(names(&mut tx, book, CategoryKind::Author).await, [("B".to_string(), 0), ("C".to_string(), 1)]);

        let again = reconcile(&mut tx, book, CategoryKind::Author, &desired).await.unwrap();
        assert!(again.is_stable());
        assert_eq!(again.unchanged.len(), 2);
        assert_eq!(names(&mut tx, book, CategoryKind::Author).await, [("B".to_string(), 0), ("C".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_existing_name_is_reused() {
        let (_repo, mut tx, book) = setup().await;
        let pratchett = tx.insert_category(CategoryKind::Author, "Terry Pratchett").await.unwrap();
        let outcome = reconcile(&mut tx, book, CategoryKind::Author, &[Desired::name(" Terry Pratchett ")]).await.unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.added, [pratchett.id]);
    }

    #[tokio::test]
    async fn test_same_name_in_another_kind_is_separate() {
        let (_repo, mut tx, book) = setup().await;
        let genre = tx.insert_category(CategoryKind::Genre, "Discworld").await.unwrap();
        let outcome = reconcile(&mut tx, book, CategoryKind::Series, &[Desired::name("Discworld")]).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_ne!(outcome.created[0].id, genre.id);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_repo, mut tx, book) = setup().await;
        let genre = tx.insert_category(CategoryKind::Genre, "Fantasy").await.unwrap();
        let err = reconcile(&mut tx, book, CategoryKind::Author, &[Desired::id(CategoryId::from(999))])
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = reconcile(&mut tx, book, CategoryKind::Author, &[Desired::id(genre.id)]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicates_keep_first_position() {
        let (_repo, mut tx, book) = setup().await;
        let desired = [Desired::name("A"), Desired::name("B"), Desired::name("A"), Desired::name("  ")];
        let outcome = reconcile(&mut tx, book, CategoryKind::Genre, &desired).await.unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(names(&mut tx, book, CategoryKind::Genre).await, [("A".to_string(), 0), ("B".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_volume_is_kept_for_series_only() {
        let (_repo, mut tx, book) = setup().await;
        reconcile(&mut tx, book, CategoryKind::Series, &[Desired::name("Discworld").with_volume("8")]).await.unwrap();
        reconcile(&mut tx, book, CategoryKind::Author, &[Desired::name("Neil Gaiman").with_volume("8")]).await.unwrap();
        let series = tx.list_links(book, CategoryKind::Series).await.unwrap();
        assert_eq!(series[0].volume.as_deref(), Some("8"));
        let authors = tx.list_links(book, CategoryKind::Author).await.unwrap();
        assert_eq!(authors[0].volume, None);

        let outcome = reconcile(&mut tx, book, CategoryKind::Series, &[Desired::name("Discworld").with_volume("8.5")])
            .await
            .unwrap();
        assert!(outcome.is_stable());
        let series = tx.list_links(book, CategoryKind::Series).await.unwrap();
        assert_eq!(series[0].volume.as_deref(), Some("8.5"));
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let (_repo, mut tx, book) = setup().await;
        reconcile(&mut tx, book, CategoryKind::Author, &[Desired::name("Terry Pratchett")]).await.unwrap();
        reconcile(&mut tx, book, CategoryKind::Narrator, &[Desired::name("Martin Jarvis")]).await.unwrap();
        reconcile(&mut tx, book, CategoryKind::Narrator, &[]).await.unwrap();
        assert!(names(&mut tx, book, CategoryKind::Narrator).await.is_empty());
        assert_eq!(names(&mut tx, book, CategoryKind::Author).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unlinked_categories_survive() {
        let (repo, mut tx, book) = setup().await;
        reconcile(&mut tx, book, CategoryKind::Genre, &[Desired::name("Comedy"), Desired::name("Fantasy")])
            .await
            .unwrap();
        let outcome = reconcile(&mut tx, book, CategoryKind::Genre, &[]).await.unwrap();
        assert_eq!(outcome.removed.len(), 2);
        tx.commit().await.unwrap();
        let genres: Vec<_> = repo.list_categories(CategoryKind::Genre).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(genres, ["Comedy", "Fantasy"]);
    }
}
