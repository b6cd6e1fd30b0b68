//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A source couldn't be read or parsed, or a value has the wrong type.
    #[display("could not load configuration")]
    Load,
    /// Values parsed but don't make sense together.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// No home directory to derive the default locations from.
    #[display("could not determine the home directory")]
    NoHomeDirectory,
}
