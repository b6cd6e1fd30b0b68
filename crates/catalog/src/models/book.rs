use crate::error::{Error, ErrorKind};
use crate::models::download::ManifestColumns;
use crate::models::facet::TagsProxy;
use crate::models::{BookId, CategoryKind, Classification, Manifest};
use exn::ResultExt;
use facet_json::{from_str as from_json, to_string as to_json};
use std::path::PathBuf;
use time::UtcDateTime;

/// A catalog entry: bibliographic metadata, the ordered classification
/// lists and, once a download has been associated, its library files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
    /// Library-relative root directory, `None` until first associated.
    pub directory: Option<PathBuf>,
    /// Library-relative paths.
    pub files: Manifest,
    pub authors: Vec<Classification>,
    pub series: Vec<Classification>,
    pub genres: Vec<Classification>,
    pub narrators: Vec<Classification>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl Book {
    /// The ordered list for one classification type.
    pub fn classifications(&self, kind: CategoryKind) -> &[Classification] {
        match kind {
            CategoryKind::Author => &self.authors,
            CategoryKind::Series => &self.series,
            CategoryKind::Genre => &self.genres,
            CategoryKind::Narrator => &self.narrators,
        }
    }

    fn classifications_mut(&mut self, kind: CategoryKind) -> &mut Vec<Classification> {
        match kind {
            CategoryKind::Author => &mut self.authors,
            CategoryKind::Series => &mut self.series,
            CategoryKind::Genre => &mut self.genres,
            CategoryKind::Narrator => &mut self.narrators,
        }
    }

    /// The rank 0 entry of a list, if the list isn't empty.
    pub fn primary(&self, kind: CategoryKind) -> Option<&Classification> {
        self.classifications(kind).first()
    }

    /// Spread links (already ordered by rank) over the four lists.
    pub(crate) fn with_classifications(mut self, links: impl IntoIterator<Item = Classification>) -> Self {
        for link in links {
            self.classifications_mut(link.category.kind).push(link);
        }
        self
    }
}

/// The scalar fields of a new book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
}

/// A partial update of a book's scalar fields: `None` leaves a field as it
/// is. Empty identifiers count as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub publish_year: Option<i32>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub tags: Option<Vec<String>>,
    pub publisher: Option<String>,
}

/// Blank identifiers are stored as NULL so they never trip the UNIQUE
/// constraints.
pub(crate) fn identifier(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub(crate) fn tags_json(tags: &[String]) -> Result<String, Error> {
    to_json(&TagsProxy::from(tags)).or_raise(|| ErrorKind::InvalidData("tags"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) subtitle: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) publish_year: Option<i64>,
    pub(crate) isbn: Option<String>,
    pub(crate) asin: Option<String>,
    pub(crate) tags: String,
    pub(crate) publisher: Option<String>,
    pub(crate) directory: Option<String>,
    pub(crate) audio_files: String,
    pub(crate) text_files: String,
    pub(crate) cover: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl TryFrom<BookRow> for Book {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let files = ManifestColumns {
            audio_files: row.audio_files,
            text_files: row.text_files,
            cover: row.cover,
        }
        .into_manifest()?;
        Ok(Self {
            id: row.id.parse::<BookId>().or_raise(|| ErrorKind::InvalidData("book id"))?,
            title: row.title,
            subtitle: row.subtitle,
            description: row.description,
            publish_year: row
                .publish_year
                .map(|y| i32::try_from(y).or_raise(|| ErrorKind::InvalidData("publish year")))
                .transpose()?,
            isbn: row.isbn,
            asin: row.asin,
            tags: from_json::<TagsProxy>(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?.into(),
            publisher: row.publisher,
            directory: row.directory.map(PathBuf::from),
            files,
            authors: Vec::new(),
            series: Vec::new(),
            genres: Vec::new(),
            narrators: Vec::new(),
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryId};
    use rstest::rstest;

    fn row() -> BookRow {
        BookRow {
            id: BookId::generate().to_string(),
            title: "Foundation".to_string(),
            subtitle: None,
            description: None,
            publish_year: Some(1951),
            isbn: Some("9780553293357".to_string()),
            asin: None,
            tags: r#"["classic"]"#.to_string(),
            publisher: None,
            directory: None,
            audio_files: "[]".to_string(),
            text_files: "[]".to_string(),
            cover: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn link(id: i64, kind: CategoryKind, name: &str, rank: u32) -> Classification {
        Classification {
            category: Category { id: CategoryId::from(id), kind, name: name.to_string() },
            rank,
            volume: None,
        }
    }

    #[test]
    fn test_row_to_model() {
        let book = Book::try_from(row()).unwrap();
        assert_eq!(book.title, "Foundation");
        assert_eq!(book.publish_year, Some(1951));
        assert_eq!(book.tags, ["classic"]);
        assert_eq!(book.directory, None);
        assert!(book.files.is_empty());
    }

    #[test]
    fn test_row_id_round_trips() {
        let id = BookId::generate();
        let book = Book::try_from(BookRow { id: id.to_string(), ..row() }).unwrap();
        assert_eq!(book.id, id);
        let err = Book::try_from(BookRow { id: "book1".to_string(), ..row() }).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("book id")));
    }

    #[test]
    fn test_classifications_are_spread_by_kind() {
        let book = Book::try_from(row()).unwrap().with_classifications([
            link(1, CategoryKind::Author, "Asimov", 0),
            link(2, CategoryKind::Genre, "Science Fiction", 0),
            link(3, CategoryKind::Author, "Silverberg", 1),
        ]);
        assert_eq!(book.primary(CategoryKind::Author).unwrap().category.name, "Asimov");
        assert_eq!(book.authors.len(), 2);
        assert_eq!(book.genres.len(), 1);
        assert!(book.primary(CategoryKind::Series).is_none());
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("   "), None)]
    #[case(Some(" 0553293354 "), Some("0553293354"))]
    fn test_identifier_normalization(#[case] input: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(identifier(&input.map(str::to_string)).as_deref(), expected);
    }
}
