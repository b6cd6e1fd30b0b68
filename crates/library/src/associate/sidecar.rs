//! The `metadata.json` descriptor written next to associated files.
//!
//! Field names follow the layout audiobook servers such as Audiobookshelf
//! read from a book folder, so the library can be imported elsewhere
//! without a catalog.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use facet_json::to_string as to_json;
use tome_catalog::{Book, Classification};

pub(crate) const FILE_NAME: &str = "metadata.json";

#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug))]
pub(crate) struct Sidecar {
    title: String,
    subtitle: Option<String>,
    authors: Vec<String>,
    narrators: Vec<String>,
    /// `Name #volume`, or just the name.
    series: Vec<String>,
    genres: Vec<String>,
    tags: Vec<String>,
    #[facet(rename = "publishedYear")]
    published_year: Option<String>,
    publisher: Option<String>,
    description: Option<String>,
    isbn: Option<String>,
    asin: Option<String>,
}

impl From<&Book> for Sidecar {
    fn from(book: &Book) -> Self {
        let names = |list: &[Classification]| -> Vec<String> { list.iter().map(|c| c.category.name.clone()).collect() };
        Self {
            title: book.title.clone(),
            subtitle: book.subtitle.clone(),
            authors: names(&book.authors),
            narrators: names(&book.narrators),
            series: book
                .series
                .iter()
                .map(|c| match c.volume.as_deref() {
                    Some(volume) if !volume.is_empty() => format!("{} #{volume}", c.category.name),
                    _ => c.category.name.clone(),
                })
                .collect(),
            genres: names(&book.genres),
            tags: book.tags.clone(),
            published_year: book.publish_year.map(|year| year.to_string()),
            publisher: book.publisher.clone(),
            description: book.description.clone(),
            isbn: book.isbn.clone(),
            asin: book.asin.clone(),
        }
    }
}

impl Sidecar {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(to_json(self).or_raise(|| ErrorKind::Io)?.into_bytes())
    }
}
