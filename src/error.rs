//! Error types for row parsing, geometry decoding, search and persistence.
//!
//! None of these is fatal to a run: the engine turns every one of them into
//! a logged, skipped row or into "no candidate".

use thiserror::Error;

/// A hex-encoded geometry column could not be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("truncated geometry buffer at byte {0}")]
    Truncated(usize),

    #[error("unknown byte order marker {0}")]
    ByteOrder(u8),

    #[error("unsupported geometry type {0}")]
    UnsupportedType(u32),

    #[error("expected a point, got {0}")]
    NotAPoint(&'static str),

    #[error("trailing bytes after geometry")]
    TrailingBytes,
}

/// An input row that cannot be reconciled at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("wrong number of columns: expected {expected}, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("row has no name")]
    MissingName,

    #[error("unparsable location: {0}")]
    Location(#[from] GeometryError),
}

/// The search capability failed; callers degrade to "no candidate".
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search transport error: {0}")]
    Transport(String),

    #[error("unexpected search response: {0}")]
    Response(String),
}

impl From<elasticsearch::Error> for SearchError {
    fn from(e: elasticsearch::Error) -> Self {
        SearchError::Transport(e.to_string())
    }
}

/// Persistence failure for a single record.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record violates a constraint of the store
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
