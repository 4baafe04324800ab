use std::sync::Arc;

use thiserror::Error;

/// Result type used by storage backends and parsers.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by storage backends and input parsing.
///
/// Experience decisions themselves never fail. These errors surface only from the plumbing
/// around them, and the client degrades (logging a warning) instead of propagating them.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Storage backend cannot be used (e.g., its lock was poisoned).
    #[error("storage unavailable")]
    StorageUnavailable,
    /// Page document could not be parsed.
    #[error("error parsing page document")]
    PageParseError(#[source] Arc<serde_json::Error>),
    /// Persisted storage file is not a JSON object of strings.
    #[error("storage file is corrupted")]
    CorruptedStorage(#[source] Arc<serde_json::Error>),
    /// Page URL could not be parsed.
    #[error("invalid page url")]
    InvalidUrl(#[source] url::ParseError),
    /// Storage file could not be read or written.
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    #[error(transparent)]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}
