//! Destination path templating for associated bundles.
//!
//! Renders the library-relative directory a staged bundle is moved into
//! from a user-configured [upon] template. The template syntax follows
//! upon's Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`),
//! extended with library-specific formatters and functions:
//!
//! - **`slug`**: Converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`**: Truncates strings to a maximum byte length at a character
//!   boundary, usable as either `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable    | Description                                                  |
//! |-------------|--------------------------------------------------------------|
//! | `author`    | Name of the rank 0 author, `Unknown` if there is none         |
//! | `series`    | Name of the rank 0 series, empty if there is none             |
//! | `volume`    | Volume index within that series, empty if there is none       |
//! | `title`     | Book title                                                    |
//! | `directory` | Name of the bundle directory in the staging root              |
//!
//! Empty segments collapse, so the default template puts a book without a
//! series at `<author>/<directory>`.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use tome_library::{Destination, PathGenerator};
//!
//! let generator: PathGenerator = "{{ author|slug }}/{{ series }}/{{ directory }}".parse().unwrap();
//! let destination = Destination { author: "Isaac Asimov", title: "Foundation", directory: "book1", ..Default::default() };
//! assert_eq!(generator.generate(&destination).unwrap(), Path::new("isaac-asimov/book1"));
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::path::PathBuf;
use std::str::FromStr;
use tome_storage::validate_path;
use tracing::instrument;
use upon::{Engine, Template};

/// The template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "{{ author }}/{{ series }}/{{ directory }}";
/// Author segment for books without any author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Values a destination path is rendered from.
#[derive(Debug, Clone, Copy, Default)]
pub struct Destination<'a> {
    pub author: &'a str,
    pub series: &'a str,
    pub volume: &'a str,
    pub title: &'a str,
    pub directory: &'a str,
}

/// Generates library-relative destination paths from a template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time. The
/// compiled template is reusable across many [`generate`](Self::generate) calls.
///
/// Generated paths are normalized (blank segments dropped) and
/// validated by [`tome_storage::validate_path`] to prevent directory traversal.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    /// Compiles the given template string into a reusable [`PathGenerator`].
    ///
    /// Registers the `slug` formatter and `truncate` function before compiling,
    /// so both are available in the template. Returns [`ErrorKind::Template`] if
    /// the template syntax is invalid.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        // Compile the template early so we can fail-fast in construction.
        // Surrounding whitespace belongs to the template, not to any value.
        let template = engine.compile(s.trim().to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl std::fmt::Debug for PathGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGenerator").finish_non_exhaustive()
    }
}
impl PathGenerator {
    /// Renders the template, returning the normalized library-relative path.
    ///
    /// Path separators inside values are replaced, so a name like `AC/DC`
    /// can't add a directory level of its own.
    #[instrument(skip_all, fields(directory = destination.directory))]
    pub fn generate(&self, destination: &Destination<'_>) -> Result<PathBuf> {
        let path = self
            .template
            .render(&self.engine, Self::parameters(destination))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(&path)
    }

    /// Drops blank segments and rejects `.` and `..`, then validates via
    /// [`tome_storage::validate_path`].
    ///
    /// Substituted values are never trimmed here, so a staging directory
    /// keeps its exact name.
    fn normalize(s: &str) -> Result<PathBuf> {
        let mut segments = Vec::new();
        for segment in s.split('/') {
            match segment {
                "." | ".." => exn::bail!(ErrorKind::Template),
                _ if segment.trim().is_empty() => {},
                _ => segments.push(segment),
            }
        }
        validate_path(segments.join("/")).or_raise(|| ErrorKind::Template)
    }

    fn parameters(destination: &Destination<'_>) -> upon::Value {
        let name = |value: &str| Self::segment(value.trim());
        upon::value! {
            author: name(destination.author),
            series: name(destination.series),
            volume: name(destination.volume),
            title: name(destination.title),
            directory: Self::segment(destination.directory),
        }
    }

    /// A value can neither add a directory level nor remove one.
    fn segment(value: &str) -> String {
        match value {
            "." | ".." => value.replace('.', "_"),
            _ => value.replace(['/', '\\'], "_"),
        }
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Custom formatter that converts strings to URL-safe slugs.
    ///
    /// Strips quotation marks before slugifying to avoid awkward slug output
    /// like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Truncates a string to a maximum byte length at a character boundary.
    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }
}
