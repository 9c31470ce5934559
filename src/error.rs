//! Centralized error types for tis.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the tis library.
#[derive(Error, Debug)]
pub enum TisError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The index file is structurally impossible at the given byte offset.
    #[error("Corrupt index at offset {offset}: {reason}")]
    Format { offset: u64, reason: String },

    /// An offset or length no longer fits the 32-bit on-disk fields.
    #[error("Index too large: offsets must stay below 2 GiB")]
    Overflow,

    /// `init` was asked to create an index over an existing file.
    #[error("Index file already exists: {0}")]
    IndexExists(PathBuf),

    /// Any command other than `init` needs an existing index.
    #[error("Index file not found: {0} (run 'tis init' first)")]
    IndexNotFound(PathBuf),

    /// The filename cannot be stored in a delimiter-free block.
    #[error("Invalid file name '{0}': expected [a-zA-Z0-9-]+ with a jpg, jpeg, png, gif or webp extension")]
    InvalidFilename(String),

    /// An add-file call without any usable tag.
    #[error("No tags given")]
    NoTags,

    /// The file to add does not exist.
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// The target of a move or rename is already taken.
    #[error("File already exists: {0}")]
    DataFileExists(PathBuf),

    /// A query or random pick produced no candidates.
    #[error("No files found")]
    EmptyResult,
}

/// Convenience alias for `Result<T, TisError>`.
pub type Result<T> = std::result::Result<T, TisError>;

impl TisError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Format` variant for a byte offset.
    pub fn format(offset: impl Into<u64>, reason: impl Into<String>) -> Self {
        Self::Format {
            offset: offset.into(),
            reason: reason.into(),
        }
    }
}

/// Add two on-disk offsets, failing once the result leaves the int32 range.
pub(crate) fn offset_add(a: u32, b: u32) -> Result<u32> {
    a.checked_add(b)
        .filter(|&v| v <= i32::MAX as u32)
        .ok_or(TisError::Overflow)
}
