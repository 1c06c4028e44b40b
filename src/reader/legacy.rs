use byteorder::{NativeEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

use super::Region;
use crate::error::{DiscFileError, Result};
use crate::header::HEADER_SIZE;
use crate::validate::{validate_legacy, LegacyReport};

const CR: u8 = b'\r';

/// Navigator for the two positional generations.
///
/// Sections carry no type tag; a section is addressed by its zero-based
/// position in the file.  Text inside a section is CR-terminated Latin-1.
pub struct LegacyReader<R: Read + Seek> {
    reader:           R,
    report:           LegacyReport,
    section:          Option<Region>,
    max_variable_len: usize,
}

impl<R: Read + Seek> LegacyReader<R> {
    pub fn new(mut reader: R, max_variable_len: usize) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        let report = validate_legacy(&mut reader, file_len)?;
        Ok(Self { reader, report, section: None, max_variable_len })
    }

    pub fn report(&self) -> &LegacyReport {
        &self.report
    }

    /// Payload start of the open section.
    pub fn current_section(&self) -> Option<u64> {
        self.section.map(|r| r.start)
    }

    pub fn section_size(&self) -> Option<u32> {
        self.section.map(|r| (r.end - r.start) as u32)
    }

    /// Walk from the header to the section at `index`.  `Ok(false)` if the
    /// file has fewer sections.
    pub fn open_section(&mut self, index: usize) -> Result<bool> {
        self.section = None;
        let file_len = self.report.file_len;
        let mut pos = HEADER_SIZE as u64;

        for n in 0..=index {
            if pos >= file_len {
                return Ok(false);
            }
            self.reader.seek(SeekFrom::Start(pos))?;
            let size = self.reader.read_i32::<NativeEndian>()?;
            if size < 0 {
                return Err(DiscFileError::unrecognized(format!(
                    "negative legacy section size at offset {pos}"
                )));
            }
            if n == index {
                let start = pos + 4;
                self.section = Some(Region { start, end: start + size as u64 });
                return Ok(true);
            }
            pos += 4 + size as u64;
        }
        Ok(false)
    }

    pub fn read_word(&mut self) -> Result<i32> {
        let section = self.open_region()?;
        let pos = self.reader.stream_position()?;
        if pos + 4 > section.end {
            return Err(DiscFileError::unrecognized(format!(
                "word read at offset {pos} runs past the legacy section"
            )));
        }
        Ok(self.reader.read_i32::<NativeEndian>()?)
    }

    /// Read a CR-terminated string of at most `limit` characters.
    pub fn read_string(&mut self, limit: usize) -> Result<String> {
        self.read_line(Some(limit))
    }

    /// Read a CR-terminated string of any length, growing the buffer as
    /// it goes.
    pub fn read_string_flex(&mut self) -> Result<String> {
        self.read_line(None)
    }

    fn read_line(&mut self, limit: Option<usize>) -> Result<String> {
        let section = self.open_region()?;
        let mut pos = self.reader.stream_position()?;
        let mut bytes: Vec<u8> = Vec::new();

        loop {
            if pos >= section.end {
                return Err(DiscFileError::unrecognized(format!(
                    "unterminated string in legacy section at offset {}",
                    section.start
                )));
            }
            let b = self.reader.read_u8()?;
            pos += 1;
            if b == CR {
                break;
            }
            match limit {
                Some(limit) if bytes.len() >= limit => {
                    return Err(DiscFileError::structural(format!(
                        "legacy string at offset {pos} is longer than {limit} bytes"
                    )));
                }
                None if bytes.len() >= self.max_variable_len => {
                    return Err(DiscFileError::OutOfMemory { requested: bytes.len() + 1 });
                }
                _ => {}
            }
            if bytes.len() == bytes.capacity() {
                let grow = bytes.capacity().max(16);
                bytes
                    .try_reserve(grow)
                    .map_err(|_| DiscFileError::OutOfMemory { requested: bytes.len() + grow })?;
            }
            bytes.push(b);
        }

        Ok(bytes.into_iter().map(char::from).collect())
    }

    fn open_region(&self) -> Result<Region> {
        self.section
            .ok_or_else(|| DiscFileError::structural("no legacy section is open"))
    }

    pub(crate) fn abandon(&mut self) {
        self.section = None;
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
