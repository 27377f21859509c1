//! Error types for index, mapping and query operations.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Every failure surfaced by the crate.
///
/// Mapping-build problems are reported as `Configuration` or
/// `UnsupportedFieldType` when the mapper is built, never while mapping an
/// entity. Storage and search failures come back as one of the backend
/// variants (`Io`, `Corrupted`, `Serialization`, `WriterLocked`, `Closed`).
#[derive(Error, Debug)]
pub enum IndexError {
    // === Mapping / configuration ===
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("unsupported field type for '{field}': {reason}")]
    UnsupportedFieldType { field: String, reason: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    // === Caller errors ===
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("no element found with id '{0}'")]
    NotFound(String),

    #[error("no more elements")]
    NoSuchElement,

    // === Payload codec ===
    #[error("failed to decode stored payload: {0}")]
    Decode(String),

    #[error("failed to encode payload: {0}")]
    Encode(String),

    // === Backend ===
    #[error("index at {path} is locked by another writer")]
    WriterLocked { path: PathBuf },

    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        IndexError::Configuration { reason: reason.into() }
    }

    pub fn unsupported_field_type(field: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::UnsupportedFieldType {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        IndexError::InvalidArgument(reason.into())
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        IndexError::Corrupted { reason: reason.into() }
    }

    /// True for failures raised by the storage/search backend.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            IndexError::WriterLocked { .. }
                | IndexError::Closed(_)
                | IndexError::Io(_)
                | IndexError::Corrupted { .. }
                | IndexError::Serialization(_)
        )
    }

    /// Idempotent reads failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Io(_) | IndexError::WriterLocked { .. })
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Decode(err.to_string())
    }
}
