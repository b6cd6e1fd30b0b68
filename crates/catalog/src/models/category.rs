use crate::error::{Error, ErrorKind};
use crate::models::CategoryId;
use derive_more::Display;
use exn::ResultExt;
use std::str::FromStr;

/// The four classification types a book carries ordered lists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum CategoryKind {
    #[display("author")]
    Author,
    #[display("series")]
    Series,
    #[display("genre")]
    Genre,
    #[display("narrator")]
    Narrator,
}

impl CategoryKind {
    pub const ALL: [Self; 4] = [Self::Author, Self::Series, Self::Genre, Self::Narrator];

    /// Value stored in the `kind` columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Series => "series",
            Self::Genre => "genre",
            Self::Narrator => "narrator",
        }
    }

    /// Only series links carry a volume index.
    pub fn has_volume(&self) -> bool {
        matches!(self, Self::Series)
    }
}

impl FromStr for CategoryKind {
    type Err = Error;

    /// Accepts singular and plural forms, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "author" | "authors" => Ok(Self::Author),
            "series" => Ok(Self::Series),
            "genre" | "genres" => Ok(Self::Genre),
            "narrator" | "narrators" => Ok(Self::Narrator),
            _ => exn::bail!(ErrorKind::InvalidData("category kind")),
        }
    }
}

/// A reusable classification value, unique per (kind, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub id: CategoryId,
    pub kind: CategoryKind,
    pub name: String,
}

/// A category as attached to one book: its position in the book's list for
/// that kind and, for series, the volume index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// Dense, 0-based.
    pub rank: u32,
    pub volume: Option<String>,
}

/// One element of a list of links to write; the rank is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub category: CategoryId,
    pub volume: Option<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) id: i64,
    pub(crate) kind: String,
    pub(crate) name: String,
}
impl TryFrom<CategoryRow> for Category {
    type Error = Error;
    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::from(row.id),
            kind: row.kind.parse::<CategoryKind>()?,
            name: row.name,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LinkRow {
    #[sqlx(flatten)]
    pub(crate) category: CategoryRow,
    pub(crate) rank: i64,
    pub(crate) volume: Option<String>,
}
impl TryFrom<LinkRow> for Classification {
    type Error = Error;
    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(Self {
            category: Category::try_from(row.category)?,
            rank: u32::try_from(row.rank).or_raise(|| ErrorKind::InvalidData("rank"))?,
            volume: row.volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("author", CategoryKind::Author)]
    #[case("Authors", CategoryKind::Author)]
    #[case("series", CategoryKind::Series)]
    #[case(" GENRES ", CategoryKind::Genre)]
    #[case("narrator", CategoryKind::Narrator)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: CategoryKind) {
        assert_eq!(input.parse::<CategoryKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_kind() {
        assert!("publisher".parse::<CategoryKind>().is_err());
    }

    #[test]
    fn test_display_matches_column_value() {
        for kind in CategoryKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
            assert_eq!(kind.as_str().parse::<CategoryKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_negative_rank_is_invalid() {
        let row = LinkRow {
            category: CategoryRow { id: 1, kind: "author".to_string(), name: "Asimov".to_string() },
            rank: -1,
            volume: None,
        };
        assert!(Classification::try_from(row).is_err());
    }
}
