//! Error taxonomy shared by every layer of the codec.
//!
//! The walkers and the writer return [`DiscFileError`] through ordinary
//! `Result`s.  Only the [`DiscFile`](crate::DiscFile) handle turns a failure
//! into its sticky first-error slot; callers see the error when they close
//! the handle.

use std::io;
use thiserror::Error;

/// Coarse classification of a [`DiscFileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The underlying open/read/write/seek failed or came up short.
    IoFailure,
    /// Bad magic word, unknown format generation, or reserved header flags set.
    UnrecognizedFormat,
    /// Tiling mismatch, multiplicity violation, bad nesting or truncated record.
    StructuralViolation,
    /// A variable-length read could not grow its buffer.
    OutOfMemory,
    /// Raised by the caller through `DiscFile::set_error`.
    Caller,
    /// The handle was already closed.
    Closed,
}

#[derive(Error, Debug)]
pub enum DiscFileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unrecognised file: {0}")]
    UnrecognizedFormat(String),

    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    #[error("Out of memory: could not allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("{0}")]
    Caller(String),

    #[error("Handle is closed")]
    Closed,
}

impl DiscFileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscFileError::Io(_)                  => ErrorKind::IoFailure,
            DiscFileError::UnrecognizedFormat(_)  => ErrorKind::UnrecognizedFormat,
            DiscFileError::StructuralViolation(_) => ErrorKind::StructuralViolation,
            DiscFileError::OutOfMemory { .. }     => ErrorKind::OutOfMemory,
            DiscFileError::Caller(_)              => ErrorKind::Caller,
            DiscFileError::Closed                 => ErrorKind::Closed,
        }
    }

    pub(crate) fn unrecognized(msg: impl Into<String>) -> Self {
        DiscFileError::UnrecognizedFormat(msg.into())
    }

    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        DiscFileError::StructuralViolation(msg.into())
    }
}

/// A convenience `Result` alias using [`DiscFileError`].
pub type Result<T> = std::result::Result<T, DiscFileError>;
