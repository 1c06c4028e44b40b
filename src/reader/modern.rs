use std::io::{Read, Seek, SeekFrom};
use tracing::trace;

use super::{alloc_buffer, Region};
use crate::error::{DiscFileError, Result};
use crate::header::HEADER_SIZE;
use crate::option::{
    OptionId, OptionKind, OptionTag, OptionValue, RecordHeader, RECORD_HEADER_SIZE,
};
use crate::section::{
    ChunkHeader, ChunkType, SectionHeader, SectionType, CHUNK_HEADER_SIZE, SECTION_HEADER_SIZE,
};
use crate::validate::{validate_modern, StructureReport};

/// One decoded record from [`ModernReader::options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub offset: u64,
    pub tag:    OptionTag,
    pub value:  OptionValue,
}

/// Navigator for the sectioned generation.
///
/// Repeatable sections are enumerated through a per-type resumption cursor:
/// each successful [`open_section`](Self::open_section) on a repeatable type
/// moves that type's cursor past the section it found, so the next call
/// finds the following instance.  Singular types always resolve to their
/// one instance.
pub struct ModernReader<R: Read + Seek> {
    reader:           R,
    report:           StructureReport,
    cursors:          [u64; SectionType::COUNT],
    section:          Option<Region>,
    chunk:            Option<Region>,
    chunk_size:       u32,
    max_variable_len: usize,
}

impl<R: Read + Seek> ModernReader<R> {
    /// Validate the file structure.  `reader` may be positioned anywhere.
    pub fn new(mut reader: R, max_variable_len: usize) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        let report = validate_modern(&mut reader, file_len)?;
        Ok(Self {
            reader,
            report,
            cursors: [HEADER_SIZE as u64; SectionType::COUNT],
            section: None,
            chunk: None,
            chunk_size: 0,
            max_variable_len,
        })
    }

    pub fn report(&self) -> &StructureReport {
        &self.report
    }

    pub fn file_len(&self) -> u64 {
        self.report.file_len
    }

    /// `None` if no section of this type exists.
    pub fn is_repeatable(&self, kind: SectionType) -> Option<bool> {
        self.report.multiplicity()[kind.index()]
    }

    pub fn current_section(&self) -> Option<u64> {
        self.section.map(|r| r.start)
    }

    pub fn current_chunk(&self) -> Option<u64> {
        self.chunk.map(|r| r.start)
    }

    // ── Sections ────────────────────────────────────────────────────────────

    /// Find the next section of `kind` from its resumption cursor.
    /// `Ok(None)` once the end of the file is reached.
    pub fn open_section(&mut self, kind: SectionType) -> Result<Option<u64>> {
        if self.section.is_some() || self.chunk.is_some() {
            return Err(DiscFileError::structural("section opened while another is open"));
        }
        let file_len = self.report.file_len;
        let mut pos = self.cursors[kind.index()];

        while pos < file_len {
            if file_len - pos < SECTION_HEADER_SIZE as u64 {
                return Err(DiscFileError::structural(format!(
                    "truncated section header at offset {pos}"
                )));
            }
            self.reader.seek(SeekFrom::Start(pos))?;
            let header = SectionHeader::read(&mut self.reader)?;
            header.check(pos)?;

            let end = pos + header.size as u64;
            if header.kind == kind as u32 {
                self.section = Some(Region { start: pos, end });
                if header.multiple() {
                    self.cursors[kind.index()] = end;
                }
                trace!(offset = pos, section = kind.name(), "section opened");
                return Ok(Some(pos));
            }
            pos = end;
        }
        Ok(None)
    }

    pub fn close_section(&mut self) -> Result<()> {
        if self.chunk.is_some() {
            return Err(DiscFileError::structural("section closed with a chunk still open"));
        }
        if self.section.take().is_none() {
            return Err(DiscFileError::structural("section closed but none is open"));
        }
        Ok(())
    }

    // ── Chunks ──────────────────────────────────────────────────────────────

    pub fn open_chunk(&mut self, kind: ChunkType) -> Result<Option<u64>> {
        let section = self
            .section
            .ok_or_else(|| DiscFileError::structural("chunk opened outside a section"))?;
        if self.chunk.is_some() {
            return Err(DiscFileError::structural("chunk opened while another is open"));
        }

        let mut pos = section.start + SECTION_HEADER_SIZE as u64;
        while pos < section.end {
            if section.end - pos < CHUNK_HEADER_SIZE as u64 {
                return Err(DiscFileError::structural(format!(
                    "truncated chunk header at offset {pos}"
                )));
            }
            self.reader.seek(SeekFrom::Start(pos))?;
            let header = ChunkHeader::read(&mut self.reader)?;
            header.check(pos)?;

            if header.kind == kind as u32 {
                self.chunk = Some(Region { start: pos, end: pos + header.size as u64 });
                self.chunk_size = header.payload_size();
                return Ok(Some(pos));
            }
            pos += header.padded_size();
        }
        Ok(None)
    }

    pub fn close_chunk(&mut self) -> Result<()> {
        if self.chunk.take().is_none() {
            return Err(DiscFileError::structural("chunk closed but none is open"));
        }
        Ok(())
    }

    /// Payload size of the open chunk, header excluded.
    pub fn chunk_size(&self) -> Option<u32> {
        self.chunk.map(|_| self.chunk_size)
    }

    /// Fill `buf` from the current position inside the open chunk.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        let chunk = self.open_chunk_region()?;
        let pos = self.reader.stream_position()?;
        if pos < chunk.start + CHUNK_HEADER_SIZE as u64 || pos + buf.len() as u64 > chunk.end {
            return Err(DiscFileError::structural(format!(
                "raw read of {} bytes at offset {pos} leaves the chunk",
                buf.len()
            )));
        }
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Rewind to the first payload byte of the open chunk.
    pub fn rewind_chunk(&mut self) -> Result<()> {
        let chunk = self.open_chunk_region()?;
        self.reader.seek(SeekFrom::Start(chunk.start + CHUNK_HEADER_SIZE as u64))?;
        Ok(())
    }

    // ── Options ─────────────────────────────────────────────────────────────

    /// Offset of the first record with identifier `id` in the open chunk.
    pub fn find_option(&mut self, id: OptionId) -> Result<Option<u64>> {
        let chunk = self.open_chunk_region()?;
        let wanted = id.to_u32();
        let mut pos = chunk.start + CHUNK_HEADER_SIZE as u64;

        while pos < chunk.end {
            let header = self.record_at(pos, chunk)?;
            if header.id == wanted {
                return Ok(Some(pos));
            }
            pos = next_record(pos, &header, chunk)?;
        }
        Ok(None)
    }

    /// Find-then-decode.  `Ok(None)` when the tag is absent.
    pub fn read_option(&mut self, kind: OptionKind, tag: OptionTag) -> Result<Option<OptionValue>> {
        let chunk = self.open_chunk_region()?;
        let Some(pos) = self.find_option(OptionId::new(kind, tag))? else {
            return Ok(None);
        };
        let header = self.record_at(pos, chunk)?;
        let value = self.decode_record(pos, &header, chunk)?;
        Ok(Some(value))
    }

    /// Every record in the open chunk in file order.
    pub fn options(&mut self) -> Result<Vec<OptionEntry>> {
        let chunk = self.open_chunk_region()?;
        let mut entries = Vec::new();
        let mut pos = chunk.start + CHUNK_HEADER_SIZE as u64;

        while pos < chunk.end {
            let header = self.record_at(pos, chunk)?;
            let next = next_record(pos, &header, chunk)?;
            match OptionId::from_u32(header.id) {
                Ok(id) => {
                    let value = self.decode_record(pos, &header, chunk)?;
                    entries.push(OptionEntry { offset: pos, tag: id.tag, value });
                }
                Err(_) => trace!(offset = pos, id = header.id, "skipping option of unknown kind"),
            }
            pos = next;
        }
        Ok(entries)
    }

    fn record_at(&mut self, pos: u64, chunk: Region) -> Result<RecordHeader> {
        if chunk.end - pos < RECORD_HEADER_SIZE as u64 {
            return Err(DiscFileError::structural(format!(
                "truncated option record at offset {pos}"
            )));
        }
        self.reader.seek(SeekFrom::Start(pos))?;
        RecordHeader::read(&mut self.reader)
    }

    fn decode_record(&mut self, pos: u64, header: &RecordHeader, chunk: Region) -> Result<OptionValue> {
        let extent = next_record(pos, header, chunk)? - pos;
        let payload_len = (extent - RECORD_HEADER_SIZE as u64) as usize;
        let mut payload = alloc_buffer(payload_len, self.max_variable_len)?;
        self.reader.seek(SeekFrom::Start(pos + RECORD_HEADER_SIZE as u64))?;
        self.reader.read_exact(&mut payload)?;
        OptionValue::decode(header, &payload)
    }

    fn open_chunk_region(&self) -> Result<Region> {
        self.chunk
            .ok_or_else(|| DiscFileError::structural("no chunk is open"))
    }

    pub(crate) fn abandon(&mut self) {
        self.section = None;
        self.chunk = None;
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Offset of the record after the one at `pos`, which must end inside the
/// chunk.
fn next_record(pos: u64, header: &RecordHeader, chunk: Region) -> Result<u64> {
    let next = pos + header.extent()?;
    if next > chunk.end {
        return Err(DiscFileError::structural(format!(
            "option record at offset {pos} overruns its chunk"
        )));
    }
    Ok(next)
}
