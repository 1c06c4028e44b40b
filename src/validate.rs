//! Eager structural validation, run once when a file is opened for reading.
//!
//! # Modern files
//!
//! Every section from the end of the header to the end of the file is
//! visited.  For each one the validator checks:
//!
//! - magic word, type tag range, reserved flags, size alignment;
//! - multiplicity: a type's first instance fixes whether later instances
//!   are allowed, and every later instance must carry the same flag;
//! - chunks: magic word, type tag range, reserved flags, and that the padded
//!   chunk extents tile the section with no gap, overlap or overhang.
//!
//! Finally the sections must tile the file exactly.  The first violation
//! aborts the walk; nothing past it is trusted.
//!
//! # Legacy files
//!
//! A flat run of `(int32 size, payload)` pairs that must end exactly at the
//! end of the file.

use byteorder::{NativeEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

use crate::error::{DiscFileError, Result};
use crate::header::HEADER_SIZE;
use crate::section::{
    ChunkHeader, ChunkType, SectionHeader, SectionType, CHUNK_HEADER_SIZE, SECTION_HEADER_SIZE,
};

// ── Report types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub offset: u64,
    pub kind:   ChunkType,
    /// Unpadded size, header included.
    pub size:   u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub offset:   u64,
    pub kind:     SectionType,
    pub size:     u32,
    pub multiple: bool,
    pub chunks:   Vec<ChunkSummary>,
}

/// Everything the validator saw in a well-formed modern file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureReport {
    pub file_len: u64,
    pub sections: Vec<SectionSummary>,
}

impl StructureReport {
    pub fn sections_of(&self, kind: SectionType) -> impl Iterator<Item = &SectionSummary> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    /// Per-type multiplicity as fixed by each type's first instance.
    pub fn multiplicity(&self) -> [Option<bool>; SectionType::COUNT] {
        let mut out = [None; SectionType::COUNT];
        for s in &self.sections {
            out[s.kind.index()].get_or_insert(s.multiple);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegacySection {
    /// Offset of the size word.
    pub offset: u64,
    pub size:   u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyReport {
    pub file_len: u64,
    pub sections: Vec<LegacySection>,
}

// ── Modern walk ─────────────────────────────────────────────────────────────

pub fn validate_modern<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<StructureReport> {
    let mut report = StructureReport { file_len, sections: Vec::new() };
    let mut seen: [Option<bool>; SectionType::COUNT] = [None; SectionType::COUNT];
    let mut pos = HEADER_SIZE as u64;

    while pos < file_len {
        if file_len - pos < SECTION_HEADER_SIZE as u64 {
            return Err(DiscFileError::structural(format!(
                "truncated section header at offset {pos}"
            )));
        }
        reader.seek(SeekFrom::Start(pos))?;
        let header = SectionHeader::read(&mut *reader)?;
        header.check(pos)?;

        let kind = header.section_type().ok_or_else(|| {
            DiscFileError::structural(format!("unknown section type {} at offset {pos}", header.kind))
        })?;
        let end = pos + header.size as u64;
        if end > file_len {
            return Err(DiscFileError::structural(format!(
                "section at offset {pos} overruns the end of the file"
            )));
        }

        match seen[kind.index()] {
            None => seen[kind.index()] = Some(header.multiple()),
            Some(false) => {
                return Err(DiscFileError::structural(format!(
                    "second {} section at offset {pos} but the type is singular",
                    kind.name()
                )));
            }
            Some(true) if !header.multiple() => {
                return Err(DiscFileError::structural(format!(
                    "{} section at offset {pos} disagrees on multiplicity",
                    kind.name()
                )));
            }
            Some(true) => {}
        }

        let chunks = validate_chunks(reader, pos + SECTION_HEADER_SIZE as u64, end)?;
        report.sections.push(SectionSummary {
            offset: pos,
            kind,
            size: header.size,
            multiple: header.multiple(),
            chunks,
        });
        pos = end;
    }

    if pos != file_len {
        return Err(DiscFileError::structural(format!(
            "sections end at {pos} but the file is {file_len} bytes"
        )));
    }

    debug!(sections = report.sections.len(), file_len, "modern structure validated");
    Ok(report)
}

fn validate_chunks<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> Result<Vec<ChunkSummary>> {
    let mut chunks = Vec::new();
    let mut pos = start;

    while pos < end {
        if end - pos < CHUNK_HEADER_SIZE as u64 {
            return Err(DiscFileError::structural(format!(
                "truncated chunk header at offset {pos}"
            )));
        }
        reader.seek(SeekFrom::Start(pos))?;
        let header = ChunkHeader::read(&mut *reader)?;
        header.check(pos)?;

        let kind = header.chunk_type().ok_or_else(|| {
            DiscFileError::structural(format!("unknown chunk type {} at offset {pos}", header.kind))
        })?;
        let next = pos + header.padded_size();
        if next > end {
            return Err(DiscFileError::structural(format!(
                "chunk at offset {pos} overhangs its section"
            )));
        }
        chunks.push(ChunkSummary { offset: pos, kind, size: header.size });
        pos = next;
    }

    Ok(chunks)
}

// ── Legacy walk ─────────────────────────────────────────────────────────────

pub fn validate_legacy<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<LegacyReport> {
    let mut report = LegacyReport { file_len, sections: Vec::new() };
    let mut pos = HEADER_SIZE as u64;

    reader.seek(SeekFrom::Start(pos))?;
    while pos < file_len {
        if file_len - pos < 4 {
            return Err(DiscFileError::unrecognized(format!(
                "truncated legacy section size at offset {pos}"
            )));
        }
        let size = reader.read_i32::<NativeEndian>()?;
        if size < 0 {
            return Err(DiscFileError::unrecognized(format!(
                "negative legacy section size {size} at offset {pos}"
            )));
        }
        report.sections.push(LegacySection { offset: pos, size: size as u32 });
        pos += 4 + size as u64;
        if pos > file_len {
            break;
        }
        reader.seek(SeekFrom::Start(pos))?;
    }

    if pos != file_len {
        return Err(DiscFileError::unrecognized(format!(
            "legacy sections end at {pos} but the file is {file_len} bytes"
        )));
    }

    debug!(sections = report.sections.len(), file_len, "legacy structure validated");
    Ok(report)
}
