use derive_more::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a [`StagedDownload`](crate::StagedDownload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct DownloadId(Uuid);

/// Identity of a [`Book`](crate::Book).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct BookId(Uuid);

/// Identity of a [`Category`](crate::Category) (the integer row id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct CategoryId(i64);

impl DownloadId {
    /// A fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}
impl BookId {
    /// A fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}
impl CategoryId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<Uuid> for DownloadId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
impl From<Uuid> for BookId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
impl From<i64> for CategoryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for DownloadId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}
impl FromStr for BookId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}
