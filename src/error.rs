use thiserror::Error;

use crate::types::ListId;

#[derive(Error, Debug)]
pub enum AnnError {
    // List errors
    #[error("list not found: {list_id}")]
    NotFound { list_id: ListId },

    #[error("list already exists: {list_id}")]
    AlreadyExists { list_id: ListId },

    #[error("offset {offset} + count {count} exceeds length {length} of list {list_id}")]
    OutOfRange {
        list_id: ListId,
        offset: usize,
        count: usize,
        length: usize,
    },

    // Validation errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read from {path}: expected {expected} records, got {actual}")]
    ShortRead {
        path: String,
        expected: usize,
        actual: usize,
    },

    // Manifest errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // Internal
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, AnnError>;

/// Coarse classification of an [`AnnError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    OutOfRange,
    IoFailure,
    InvariantViolation,
}

impl AnnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnError::NotFound { .. } => ErrorKind::NotFound,

            AnnError::AlreadyExists { .. } => ErrorKind::AlreadyExists,

            AnnError::InvalidArgument(_)
            | AnnError::DimensionMismatch { .. }
            | AnnError::Config(_) => ErrorKind::InvalidArgument,

            AnnError::OutOfRange { .. } => ErrorKind::OutOfRange,

            AnnError::Io(_) | AnnError::ShortRead { .. } | AnnError::Json(_) => {
                ErrorKind::IoFailure
            }

            AnnError::ChecksumMismatch { .. } | AnnError::InvariantViolation(_) => {
                ErrorKind::InvariantViolation
            }
        }
    }
}
