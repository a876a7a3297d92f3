//! Archive error types.

use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur while packing or unpacking archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive is corrupt: {0}")]
    Corrupt(String),

    #[error("duplicate entry name: {0}")]
    DuplicateEntry(String),

    #[error("invalid entry name: {0:?}")]
    InvalidEntryName(String),

    #[error("entry {name:?} would escape the destination directory")]
    UnsafeEntryName { name: String },

    #[error("destination directory does not exist: {}", .0.display())]
    MissingDestination(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::Corrupt(other.to_string()),
        }
    }
}
