//! Section and chunk headers of the modern container generation.
//!
//! Both headers share one 16-byte shape:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 4    | magic word |
//! | 4      | 4    | type tag |
//! | 8      | 4    | size in bytes, header included |
//! | 12     | 4    | flags |
//!
//! A section's size is always a multiple of 4.  A chunk's size is the
//! unpadded length; its payload is followed by zero bytes up to the next
//! word boundary.

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::{DiscFileError, Result};

pub const SECTION_MAGIC: u32 = u32::from_le_bytes(*b"SECT");
pub const CHUNK_MAGIC:   u32 = u32::from_le_bytes(*b"CHNK");

pub const SECTION_HEADER_SIZE: usize = 16;
pub const CHUNK_HEADER_SIZE:   usize = 16;

/// The only meaningful section flag: further instances of this type may follow.
pub const SECTION_FLAG_MULTIPLE: u32 = 0x0000_0001;

/// Round `n` up to the next multiple of 4.
pub const fn align4(n: u64) -> u64 {
    (n + 3) & !3
}

// ── Type tags ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SectionType {
    Search   = 1,
    Options  = 2,
    Dialogue = 3,
    Results  = 4,
    Objects  = 5,
    Hotlist  = 6,
}

impl SectionType {
    pub const COUNT: usize = 6;

    pub const ALL: [SectionType; SectionType::COUNT] = [
        SectionType::Search,
        SectionType::Options,
        SectionType::Dialogue,
        SectionType::Results,
        SectionType::Objects,
        SectionType::Hotlist,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u32 == value)
    }

    /// Dense index for per-type tables.
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionType::Search   => "search",
            SectionType::Options  => "options",
            SectionType::Dialogue => "dialogue",
            SectionType::Results  => "results",
            SectionType::Objects  => "objects",
            SectionType::Hotlist  => "hotlist",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|t| t.name() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ChunkType {
    Config   = 1,
    Dialogue = 2,
    Files    = 3,
    Objects  = 4,
    Results  = 5,
    TextDump = 6,
}

impl ChunkType {
    pub const ALL: [ChunkType; 6] = [
        ChunkType::Config,
        ChunkType::Dialogue,
        ChunkType::Files,
        ChunkType::Objects,
        ChunkType::Results,
        ChunkType::TextDump,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u32 == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChunkType::Config   => "config",
            ChunkType::Dialogue => "dialogue",
            ChunkType::Files    => "files",
            ChunkType::Objects  => "objects",
            ChunkType::Results  => "results",
            ChunkType::TextDump => "textdump",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|t| t.name() == s)
    }
}

// ── Headers ─────────────────────────────────────────────────────────────────

/// Section header as stored on disk.  `kind` is left raw so that the
/// validator can report out-of-range tags instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub magic: u32,
    pub kind:  u32,
    pub size:  u32,
    pub flags: u32,
}

impl SectionHeader {
    pub fn new(kind: SectionType, multiple: bool) -> Self {
        Self {
            magic: SECTION_MAGIC,
            kind:  kind as u32,
            size:  0,
            flags: if multiple { SECTION_FLAG_MULTIPLE } else { 0 },
        }
    }

    pub fn multiple(&self) -> bool {
        self.flags & SECTION_FLAG_MULTIPLE != 0
    }

    pub fn section_type(&self) -> Option<SectionType> {
        SectionType::from_u32(self.kind)
    }

    /// Magic word and reserved flags; the checks every reader applies to
    /// each header it crosses.
    pub fn check(&self, offset: u64) -> Result<()> {
        if self.magic != SECTION_MAGIC {
            return Err(DiscFileError::structural(format!(
                "bad section magic word {:#010x} at offset {offset}",
                self.magic
            )));
        }
        if self.flags & !SECTION_FLAG_MULTIPLE != 0 {
            return Err(DiscFileError::structural(format!(
                "reserved section flags {:#010x} at offset {offset}",
                self.flags
            )));
        }
        if (self.size as usize) < SECTION_HEADER_SIZE || self.size % 4 != 0 {
            return Err(DiscFileError::structural(format!(
                "bad section size {} at offset {offset}",
                self.size
            )));
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<NativeEndian>(self.magic)?;
        writer.write_u32::<NativeEndian>(self.kind)?;
        writer.write_u32::<NativeEndian>(self.size)?;
        writer.write_u32::<NativeEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            magic: reader.read_u32::<NativeEndian>()?,
            kind:  reader.read_u32::<NativeEndian>()?,
            size:  reader.read_u32::<NativeEndian>()?,
            flags: reader.read_u32::<NativeEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub magic: u32,
    pub kind:  u32,
    pub size:  u32,
    pub flags: u32,
}

impl ChunkHeader {
    pub fn new(kind: ChunkType) -> Self {
        Self {
            magic: CHUNK_MAGIC,
            kind:  kind as u32,
            size:  0,
            flags: 0,
        }
    }

    pub fn chunk_type(&self) -> Option<ChunkType> {
        ChunkType::from_u32(self.kind)
    }

    /// On-disk extent including the trailing word padding.
    pub fn padded_size(&self) -> u64 {
        align4(self.size as u64)
    }

    pub fn payload_size(&self) -> u32 {
        self.size.saturating_sub(CHUNK_HEADER_SIZE as u32)
    }

    pub fn check(&self, offset: u64) -> Result<()> {
        if self.magic != CHUNK_MAGIC {
            return Err(DiscFileError::structural(format!(
                "bad chunk magic word {:#010x} at offset {offset}",
                self.magic
            )));
        }
        if self.flags != 0 {
            return Err(DiscFileError::structural(format!(
                "reserved chunk flags {:#010x} at offset {offset}",
                self.flags
            )));
        }
        if (self.size as usize) < CHUNK_HEADER_SIZE {
            return Err(DiscFileError::structural(format!(
                "bad chunk size {} at offset {offset}",
                self.size
            )));
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<NativeEndian>(self.magic)?;
        writer.write_u32::<NativeEndian>(self.kind)?;
        writer.write_u32::<NativeEndian>(self.size)?;
        writer.write_u32::<NativeEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            magic: reader.read_u32::<NativeEndian>()?,
            kind:  reader.read_u32::<NativeEndian>()?,
            size:  reader.read_u32::<NativeEndian>()?,
            flags: reader.read_u32::<NativeEndian>()?,
        })
    }
}
