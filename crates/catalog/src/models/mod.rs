mod book;
mod category;
mod download;
mod facet;
mod ids;
mod manifest;

pub use self::book::{Book, BookFields, BookPatch};
pub(crate) use self::book::{BookRow, identifier, tags_json};
pub use self::category::{Category, CategoryKind, Classification, Link};
pub(crate) use self::category::{CategoryRow, LinkRow};
pub(crate) use self::download::{DownloadRow, ManifestColumns};
pub use self::download::StagedDownload;
pub(crate) use self::facet::path_to_string;
pub use self::ids::{BookId, CategoryId, DownloadId};
pub use self::manifest::Manifest;
