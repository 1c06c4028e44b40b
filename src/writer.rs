//! Streaming container writer.
//!
//! [`DiscWriter`] emits the file header on construction and then accepts
//! sections and chunks in strict nesting order: at most one section and one
//! chunk are open at a time.  Headers are written with a zero size and
//! patched in place when the matching `end_*` call consumes the
//! [`PendingSection`] / [`PendingChunk`] token returned by `start_*`.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use crate::error::{DiscFileError, Result};
use crate::header::FileHeader;
use crate::option::{OptionTag, OptionValue};
use crate::section::{
    align4, ChunkHeader, ChunkType, SectionHeader, SectionType, CHUNK_MAGIC, SECTION_MAGIC,
};

/// A section header written with a placeholder size.
#[must_use = "a started section must be passed to end_section"]
#[derive(Debug, PartialEq, Eq)]
pub struct PendingSection {
    writer: u64,
    offset: u64,
}

impl PendingSection {
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// A chunk header written with a placeholder size.
#[must_use = "a started chunk must be passed to end_chunk"]
#[derive(Debug, PartialEq, Eq)]
pub struct PendingChunk {
    writer: u64,
    offset: u64,
}

impl PendingChunk {
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Writer identities.  A token only closes a region of the writer that
/// issued it.
static NEXT_WRITER: AtomicU64 = AtomicU64::new(1);

pub struct DiscWriter<W: Read + Write + Seek> {
    id:      u64,
    inner:   W,
    section: Option<u64>,
    chunk:   Option<u64>,
}

impl<W: Read + Write + Seek> DiscWriter<W> {
    /// Write the header at offset 0.
    pub fn new(mut inner: W) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        FileHeader::new().write(&mut inner)?;
        let id = NEXT_WRITER.fetch_add(1, Ordering::Relaxed);
        Ok(Self { id, inner, section: None, chunk: None })
    }

    pub fn open_section(&self) -> Option<u64> {
        self.section
    }

    pub fn open_chunk(&self) -> Option<u64> {
        self.chunk
    }

    // ── Sections ────────────────────────────────────────────────────────────

    pub fn start_section(&mut self, kind: SectionType, multiple: bool) -> Result<PendingSection> {
        if self.section.is_some() || self.chunk.is_some() {
            return Err(DiscFileError::structural("section started while another is open"));
        }
        let offset = self.inner.stream_position()?;
        SectionHeader::new(kind, multiple).write(&mut self.inner)?;
        self.section = Some(offset);
        trace!(offset, section = kind.name(), multiple, "section started");
        Ok(PendingSection { writer: self.id, offset })
    }

    pub fn end_section(&mut self, pending: PendingSection) -> Result<()> {
        if pending.writer != self.id {
            return Err(DiscFileError::structural("section token belongs to another file"));
        }
        if self.section != Some(pending.offset) {
            return Err(DiscFileError::structural("section ended but not open"));
        }
        if self.chunk.is_some() {
            return Err(DiscFileError::structural("section ended with a chunk still open"));
        }
        let end = self.inner.stream_position()?;
        let size = patch_size(end, pending.offset)?;

        self.inner.seek(SeekFrom::Start(pending.offset))?;
        let mut header = SectionHeader::read(&mut self.inner)?;
        if header.magic != SECTION_MAGIC {
            return Err(DiscFileError::structural(format!(
                "section header at {} was overwritten",
                pending.offset
            )));
        }
        header.size = size;
        self.inner.seek(SeekFrom::Start(pending.offset))?;
        header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;

        self.section = None;
        trace!(offset = pending.offset, size, "section ended");
        Ok(())
    }

    // ── Chunks ──────────────────────────────────────────────────────────────

    pub fn start_chunk(&mut self, kind: ChunkType) -> Result<PendingChunk> {
        if self.section.is_none() {
            return Err(DiscFileError::structural("chunk started outside a section"));
        }
        if self.chunk.is_some() {
            return Err(DiscFileError::structural("chunk started while another is open"));
        }
        let offset = self.inner.stream_position()?;
        ChunkHeader::new(kind).write(&mut self.inner)?;
        self.chunk = Some(offset);
        Ok(PendingChunk { writer: self.id, offset })
    }

    pub fn end_chunk(&mut self, pending: PendingChunk) -> Result<()> {
        if pending.writer != self.id {
            return Err(DiscFileError::structural("chunk token belongs to another file"));
        }
        if self.chunk != Some(pending.offset) {
            return Err(DiscFileError::structural("chunk ended but not open"));
        }
        let end = self.inner.stream_position()?;
        let size = patch_size(end, pending.offset)?;

        self.inner.seek(SeekFrom::Start(pending.offset))?;
        let mut header = ChunkHeader::read(&mut self.inner)?;
        if header.magic != CHUNK_MAGIC {
            return Err(DiscFileError::structural(format!(
                "chunk header at {} was overwritten",
                pending.offset
            )));
        }
        header.size = size;
        self.inner.seek(SeekFrom::Start(pending.offset))?;
        header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;

        let padding = (align4(end) - end) as usize;
        self.inner.write_all(&[0u8; 3][..padding])?;

        self.chunk = None;
        Ok(())
    }

    // ── Payload ─────────────────────────────────────────────────────────────

    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        if self.chunk.is_none() {
            return Err(DiscFileError::structural("raw data written outside a chunk"));
        }
        self.inner.write_all(data)?;
        Ok(())
    }

    pub fn write_option(&mut self, tag: OptionTag, value: &OptionValue) -> Result<()> {
        if self.chunk.is_none() {
            return Err(DiscFileError::structural(format!("option {tag} written outside a chunk")));
        }
        let record = value.encode(tag)?;
        self.inner.write_all(&record)?;
        Ok(())
    }

    /// Forget any open section or chunk without patching it.
    pub(crate) fn abandon(&mut self) {
        self.section = None;
        self.chunk = None;
    }

    /// Flush and hand back the stream.  Fails if a section or chunk was
    /// left open, since its header still carries a zero size.
    pub fn finish(mut self) -> Result<W> {
        if self.section.is_some() || self.chunk.is_some() {
            return Err(DiscFileError::structural("file closed with a section still open"));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn patch_size(end: u64, start: u64) -> Result<u32> {
    u32::try_from(end - start)
        .map_err(|_| DiscFileError::structural(format!("region at {start} exceeds 4 GiB")))
}
