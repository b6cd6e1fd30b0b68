use std::path::{Path, PathBuf};

/// The classified files of a bundle, as paths relative to the directory
/// that holds the bundle (the staging root for a staged download, the
/// library root for a book).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Audio files in listing order.
    pub audio: Vec<PathBuf>,
    /// Text (ebook, document) files in listing order.
    pub text: Vec<PathBuf>,
    pub cover: Option<PathBuf>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.text.is_empty() && self.cover.is_none()
    }

    /// Moves every path from under `from` to under `to`.
    ///
    /// Paths that don't start with `from` are re-rooted as-is.
    ///
    /// ```
    /// use std::path::{Path, PathBuf};
    /// use tome_catalog::Manifest;
    /// let staged = Manifest {
    ///     audio: vec![PathBuf::from("book1/a.m4b")],
    ///     text: vec![],
    ///     cover: Some(PathBuf::from("book1/cover.jpg")),
    /// };
    /// let linked = staged.rebase(Path::new("book1"), Path::new("Asimov/book1"));
    /// assert_eq!(linked.audio, [PathBuf::from("Asimov/book1/a.m4b")]);
    /// assert_eq!(linked.cover, Some(PathBuf::from("Asimov/book1/cover.jpg")));
    /// ```
    pub fn rebase(&self, from: &Path, to: &Path) -> Self {
        let move_one = |path: &PathBuf| to.join(path.strip_prefix(from).unwrap_or(path));
        Self {
            audio: self.audio.iter().map(move_one).collect(),
            text: self.text.iter().map(move_one).collect(),
            cover: self.cover.as_ref().map(move_one),
        }
    }
}
