//! Catalog CLI Helpers

use clap::Args;
use tome_catalog::{Book, BookFields, BookPatch, CategoryKind, Classification, Manifest, StagedDownload};
use tome_library::catalog::{BookUpdate, NewBook};
use tome_library::reconcile::Desired;

/// `value_parser` for category kinds.
pub fn parse_kind(value: &str) -> Result<CategoryKind, String> {
    value
        .parse::<CategoryKind>()
        .map_err(|_| format!("expected author, series, genre or narrator, got {value:?}"))
}

/// Book fields shared by `book add` and `book edit`.
#[derive(Debug, Clone, Default, Args)]
pub struct BookArgs {
    #[arg(long)]
    pub subtitle: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub isbn: Option<String>,
    #[arg(long)]
    pub asin: Option<String>,
    #[arg(long)]
    pub publisher: Option<String>,
    /// Repeatable; replaces every tag.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Repeatable, in order; the first is the primary author.
    #[arg(long = "author", value_name = "NAME")]
    pub authors: Vec<String>,
    /// Repeatable, in order.
    #[arg(long = "series", value_name = "NAME")]
    pub series: Vec<String>,
    /// Volume of the `--series` at the same position.
    #[arg(long = "volume", value_name = "INDEX")]
    pub volumes: Vec<String>,
    #[arg(long = "genre", value_name = "NAME")]
    pub genres: Vec<String>,
    #[arg(long = "narrator", value_name = "NAME")]
    pub narrators: Vec<String>,
}

fn names(names: &[String]) -> Vec<Desired> {
    names.iter().map(Desired::name).collect()
}

impl BookArgs {
    fn series_list(&self) -> Vec<Desired> {
        self.series
            .iter()
            .enumerate()
            .map(|(i, name)| match self.volumes.get(i) {
                Some(volume) => Desired::name(name).with_volume(volume),
                None => Desired::name(name),
            })
            .collect()
    }

    pub fn into_new_book(self, title: String) -> NewBook {
        NewBook {
            authors: names(&self.authors),
            series: self.series_list(),
            genres: names(&self.genres),
            narrators: names(&self.narrators),
            fields: BookFields {
                title,
                subtitle: self.subtitle,
                description: self.description,
                publish_year: self.year,
                isbn: self.isbn,
                asin: self.asin,
                tags: self.tags,
                publisher: self.publisher,
            },
        }
    }

    /// Lists that weren't given stay untouched unless their kind is in
    /// `clear`.
    pub fn into_update(self, title: Option<String>, clear: &[CategoryKind], clear_tags: bool) -> BookUpdate {
        let list = |kind: CategoryKind, desired: Vec<Desired>| match desired.is_empty() {
            false => Some(desired),
            true => clear.contains(&kind).then(Vec::new),
        };
        let series = self.series_list();
        let tags = match (self.tags.is_empty(), clear_tags) {
            (false, _) => Some(self.tags),
            (true, true) => Some(Vec::new()),
            (true, false) => None,
        };
        BookUpdate {
            authors: list(CategoryKind::Author, names(&self.authors)),
            series: list(CategoryKind::Series, series),
            genres: list(CategoryKind::Genre, names(&self.genres)),
            narrators: list(CategoryKind::Narrator, names(&self.narrators)),
            patch: BookPatch {
                title,
                subtitle: self.subtitle,
                description: self.description,
                publish_year: self.year,
                isbn: self.isbn,
                asin: self.asin,
                tags,
                publisher: self.publisher,
            },
        }
    }
}

fn joined(list: &[Classification]) -> String {
    list.iter()
        .map(|c| match &c.volume {
            Some(volume) => format!("{} #{volume}", c.category.name),
            None => c.category.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn file_counts(files: &Manifest) -> String {
    let mut counts = format!("{} audio, {} text", files.audio.len(), files.text.len());
    if files.cover.is_some() {
        counts.push_str(", cover");
    }
    counts
}

/// One line per book: id, title, then authors and series when present.
pub fn book_line(book: &Book) -> String {
    let mut line = format!("{}  {}", book.id, book.title);
    if !book.authors.is_empty() {
        line.push_str(&format!(" by {}", joined(&book.authors)));
    }
    if !book.series.is_empty() {
        line.push_str(&format!(" [{}]", joined(&book.series)));
    }
    line
}

pub fn book_details(book: &Book) -> String {
    let mut lines = vec![book.id.to_string(), format!("title: {}", book.title)];
    let optional = [
        ("subtitle", book.subtitle.clone()),
        ("year", book.publish_year.map(|y| y.to_string())),
        ("isbn", book.isbn.clone()),
        ("asin", book.asin.clone()),
        ("publisher", book.publisher.clone()),
        ("description", book.description.clone()),
    ];
    lines.extend(optional.into_iter().filter_map(|(name, value)| Some(format!("{name}: {}", value?))));
    for kind in CategoryKind::ALL {
        let list = book.classifications(kind);
        if !list.is_empty() {
            lines.push(format!("{kind}: {}", joined(list)));
        }
    }
    if !book.tags.is_empty() {
        lines.push(format!("tags: {}", book.tags.join(", ")));
    }
    if let Some(directory) = &book.directory {
        lines.push(format!("directory: {} ({})", directory.display(), file_counts(&book.files)));
    }
    lines.join("\n")
}

pub fn download_line(download: &StagedDownload) -> String {
    format!("{}  {}  {}", download.id, download.directory, file_counts(&download.files))
}

pub fn download_details(download: &StagedDownload) -> String {
    let files = &download.files;
    let mut lines = vec![download_line(download)];
    lines.extend(files.audio.iter().chain(&files.text).map(|path| format!("  {}", path.display())));
    if let Some(cover) = &files.cover {
        lines.push(format!("  cover: {}", cover.display()));
    }
    lines.join("\n")
}
