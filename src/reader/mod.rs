//! Read-side walkers, one per format family.
//!
//! Both walkers validate the whole file eagerly in their constructor, so
//! the navigation calls that follow can assume a well-formed layout and
//! only bounds-check against the region that is currently open.

mod legacy;
mod modern;

pub use legacy::LegacyReader;
pub use modern::{ModernReader, OptionEntry};

use crate::error::{DiscFileError, Result};

/// Default cap on a single variable-length read (strings, arrays).
pub const DEFAULT_MAX_VARIABLE_LEN: usize = 1024 * 1024;

/// A byte range `[start, end)` in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub start: u64,
    pub end:   u64,
}

/// Zeroed buffer of `len` bytes, or `OutOfMemory` if that exceeds `cap` or
/// the allocator refuses.
pub(crate) fn alloc_buffer(len: usize, cap: usize) -> Result<Vec<u8>> {
    if len > cap {
        return Err(DiscFileError::OutOfMemory { requested: len });
    }
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| DiscFileError::OutOfMemory { requested: len })?;
    buf.resize(len, 0);
    Ok(buf)
}
