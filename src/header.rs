use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::{DiscFileError, Result};

/// Identifies the discfile family; first word of every container.
pub const FILE_MAGIC: u32 = u32::from_le_bytes(*b"LCTR");
pub const HEADER_SIZE: usize = 12;

/// Container generation recorded in the header.
///
/// Both legacy values are read by the same positional walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FormatGeneration {
    Legacy0 = 0,
    Legacy1 = 1,
    Modern  = 2,
}

impl FormatGeneration {
    /// The generation every new file is written in.
    pub const CURRENT: FormatGeneration = FormatGeneration::Modern;

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(FormatGeneration::Legacy0),
            1 => Some(FormatGeneration::Legacy1),
            2 => Some(FormatGeneration::Modern),
            _ => None,
        }
    }

    pub fn is_legacy(self) -> bool {
        !matches!(self, FormatGeneration::Modern)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic:  u32,
    pub format: FormatGeneration,
    pub flags:  u32,
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            magic:  FILE_MAGIC,
            format: FormatGeneration::CURRENT,
            flags:  0,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<NativeEndian>(self.magic)?;
        writer.write_u32::<NativeEndian>(self.format as u32)?;
        writer.write_u32::<NativeEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let magic = reader.read_u32::<NativeEndian>()?;
        if magic != FILE_MAGIC {
            return Err(DiscFileError::unrecognized(format!(
                "bad file magic word {magic:#010x}"
            )));
        }
        let raw_format = reader.read_u32::<NativeEndian>()?;
        let format = FormatGeneration::from_u32(raw_format).ok_or_else(|| {
            DiscFileError::unrecognized(format!("unknown format generation {raw_format}"))
        })?;
        let flags = reader.read_u32::<NativeEndian>()?;
        if flags != 0 {
            return Err(DiscFileError::unrecognized(format!(
                "reserved header flags set: {flags:#010x}"
            )));
        }
        Ok(Self { magic, format, flags })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
