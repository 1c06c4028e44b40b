//! High-level [`DiscFile`] handle through which application code persists
//! and loads its state.
//!
//! ```no_run
//! use discfile::{ChunkType, DiscFile, SectionType};
//!
//! // Write
//! let mut file = DiscFile::create("choices.dat");
//! if let Some(section) = file.start_section(SectionType::Options, false) {
//!     if let Some(chunk) = file.start_chunk(ChunkType::Config) {
//!         file.write_option_unsigned("HFG", 7);
//!         file.end_chunk(chunk);
//!     }
//!     file.end_section(section);
//! }
//! file.close()?;
//!
//! // Read
//! let mut file = DiscFile::open("choices.dat");
//! file.open_section(SectionType::Options);
//! file.open_chunk(ChunkType::Config);
//! assert_eq!(file.read_option_unsigned("HFG"), Some(7));
//! file.close()?;
//! # Ok::<(), discfile::DiscFileError>(())
//! ```
//!
//! # Sticky errors
//!
//! Operations never return `Err`.  The first failure (I/O, bad nesting,
//! malformed file) moves the handle to [`Mode::Error`] and is stored; every
//! later operation is a no-op that reports failure (`false` / `None` / `0`).
//! [`DiscFile::close`] is where the stored error surfaces.  An option tag
//! that is simply absent is *not* a failure.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::date::DateStamp;
use crate::error::{DiscFileError, ErrorKind, Result};
use crate::header::{FileHeader, FormatGeneration};
use crate::option::{OptionKind, OptionTag, OptionValue};
use crate::reader::{LegacyReader, ModernReader, OptionEntry, DEFAULT_MAX_VARIABLE_LEN};
use crate::section::{ChunkType, SectionType};
use crate::validate::{LegacyReport, StructureReport};
use crate::writer::{DiscWriter, PendingChunk, PendingSection};

// ── DiscFileOptions ─────────────────────────────────────────────────────────

/// Configuration for [`DiscFile::open_with_options`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscFileOptions {
    /// Accept the two positional generations.  When false a legacy header
    /// is reported as unrecognised.
    pub accept_legacy:    bool,
    /// Upper bound on any single string, array or flex-string read.
    pub max_variable_len: usize,
}

impl Default for DiscFileOptions {
    fn default() -> Self {
        Self {
            accept_legacy:    true,
            max_variable_len: DEFAULT_MAX_VARIABLE_LEN,
        }
    }
}

// ── Mode ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Closed,
    Read,
    Write,
    Error,
}

enum Backend {
    Legacy(LegacyReader<BufReader<File>>),
    Modern(ModernReader<BufReader<File>>),
    Writer(DiscWriter<File>),
}

impl Backend {
    fn abandon(&mut self) {
        match self {
            Backend::Legacy(r) => r.abandon(),
            Backend::Modern(r) => r.abandon(),
            Backend::Writer(w) => w.abandon(),
        }
    }
}

// ── DiscFile ────────────────────────────────────────────────────────────────

pub struct DiscFile {
    path:    PathBuf,
    backend: Option<Backend>,
    format:  Option<FormatGeneration>,
    error:   Option<DiscFileError>,
}

impl DiscFile {
    // ── Constructors ────────────────────────────────────────────────────────

    /// Create (or truncate) `path` and write the file header.
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_owned();
        let opened = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(DiscFileError::from)
            .and_then(DiscWriter::new);

        match opened {
            Ok(writer) => {
                debug!(path = %path.display(), "discfile opened for writing");
                Self {
                    path,
                    backend: Some(Backend::Writer(writer)),
                    format:  Some(FormatGeneration::CURRENT),
                    error:   None,
                }
            }
            Err(e) => Self::failed(path, None, e),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::open_with_options(path, &DiscFileOptions::default())
    }

    /// Open for reading: read the header, then validate the whole structure
    /// with the walker for the detected generation.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &DiscFileOptions) -> Self {
        let path = path.as_ref().to_owned();

        let mut reader = match File::open(&path) {
            Ok(f)  => BufReader::new(f),
            Err(e) => return Self::failed(path, None, e.into()),
        };
        let header = match FileHeader::read(&mut reader) {
            Ok(h)  => h,
            Err(e) => return Self::failed(path, None, e),
        };
        let format = header.format;
        if format.is_legacy() && !options.accept_legacy {
            let e = DiscFileError::unrecognized(format!("legacy generation {format:?} not accepted"));
            return Self::failed(path, Some(format), e);
        }

        let backend = if format.is_legacy() {
            LegacyReader::new(reader, options.max_variable_len).map(Backend::Legacy)
        } else {
            ModernReader::new(reader, options.max_variable_len).map(Backend::Modern)
        };

        match backend {
            Ok(backend) => {
                debug!(path = %path.display(), ?format, "discfile opened for reading");
                Self { path, backend: Some(backend), format: Some(format), error: None }
            }
            Err(e) => Self::failed(path, Some(format), e),
        }
    }

    fn failed(path: PathBuf, format: Option<FormatGeneration>, error: DiscFileError) -> Self {
        warn!(path = %path.display(), %error, "discfile could not be opened");
        Self { path, backend: None, format, error: Some(error) }
    }

    // ── State ───────────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        match (&self.error, &self.backend) {
            (Some(_), _)                      => Mode::Error,
            (None, None)                      => Mode::Closed,
            (None, Some(Backend::Writer(_)))  => Mode::Write,
            (None, Some(_))                   => Mode::Read,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generation detected on open, or declared on create.
    pub fn format(&self) -> Option<FormatGeneration> {
        self.format
    }

    pub fn error(&self) -> Option<&DiscFileError> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(DiscFileError::kind)
    }

    /// Record a caller-detected problem (for example an unsupported schema)
    /// as the sticky error.  Ignored if an error is already stored.
    pub fn set_error(&mut self, message: impl Into<String>) {
        if self.backend.is_some() {
            self.fail(DiscFileError::Caller(message.into()));
        }
    }

    /// Release the file and report the sticky error, if any.  Closing an
    /// already closed handle returns [`DiscFileError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let backend = self.backend.take();
        if backend.is_none() && self.error.is_none() {
            return Err(DiscFileError::Closed);
        }
        if let Some(Backend::Writer(writer)) = backend {
            if self.error.is_none() {
                if let Err(e) = writer.finish() {
                    self.fail(e);
                }
            }
        }
        match self.error.take() {
            Some(e) => Err(e),
            None    => Ok(()),
        }
    }

    fn fail(&mut self, error: DiscFileError) {
        if let Some(backend) = self.backend.as_mut() {
            backend.abandon();
        }
        if self.error.is_none() {
            warn!(path = %self.path.display(), %error, "discfile entered error state");
            self.error = Some(error);
        }
    }

    /// Run `op` against the modern reader if the handle is healthy.
    fn with_modern<T>(&mut self, op: impl FnOnce(&mut ModernReader<BufReader<File>>) -> Result<T>) -> Option<T> {
        if self.error.is_some() {
            return None;
        }
        let result = match self.backend.as_mut()? {
            Backend::Modern(r) => op(r),
            Backend::Legacy(_) => Err(DiscFileError::structural("operation needs a sectioned file")),
            Backend::Writer(_) => Err(write_only()),
        };
        self.settle(result)
    }

    fn with_legacy<T>(&mut self, op: impl FnOnce(&mut LegacyReader<BufReader<File>>) -> Result<T>) -> Option<T> {
        if self.error.is_some() {
            return None;
        }
        let result = match self.backend.as_mut()? {
            Backend::Legacy(r) => op(r),
            Backend::Modern(_) => Err(DiscFileError::structural("operation needs a legacy file")),
            Backend::Writer(_) => Err(write_only()),
        };
        self.settle(result)
    }

    fn with_writer<T>(&mut self, op: impl FnOnce(&mut DiscWriter<File>) -> Result<T>) -> Option<T> {
        if self.error.is_some() {
            return None;
        }
        let result = match self.backend.as_mut()? {
            Backend::Writer(w) => op(w),
            _                  => Err(read_only()),
        };
        self.settle(result)
    }

    fn settle<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v)  => Some(v),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    // ── Write ───────────────────────────────────────────────────────────────

    pub fn start_section(&mut self, kind: SectionType, multiple: bool) -> Option<PendingSection> {
        self.with_writer(|w| w.start_section(kind, multiple))
    }

    pub fn end_section(&mut self, section: PendingSection) -> bool {
        self.with_writer(|w| w.end_section(section)).is_some()
    }

    pub fn start_chunk(&mut self, kind: ChunkType) -> Option<PendingChunk> {
        self.with_writer(|w| w.start_chunk(kind))
    }

    pub fn end_chunk(&mut self, chunk: PendingChunk) -> bool {
        self.with_writer(|w| w.end_chunk(chunk)).is_some()
    }

    pub fn write_raw(&mut self, data: &[u8]) -> bool {
        self.with_writer(|w| w.write_raw(data)).is_some()
    }

    pub fn write_option(&mut self, tag: &str, value: &OptionValue) -> bool {
        self.with_writer(|w| w.write_option(OptionTag::new(tag)?, value)).is_some()
    }

    pub fn write_option_boolean(&mut self, tag: &str, value: bool) -> bool {
        self.write_option(tag, &OptionValue::Boolean(value))
    }

    pub fn write_option_unsigned(&mut self, tag: &str, value: u32) -> bool {
        self.write_option(tag, &OptionValue::Unsigned(value))
    }

    pub fn write_option_string(&mut self, tag: &str, value: &str) -> bool {
        self.write_option(tag, &OptionValue::String(value.to_owned()))
    }

    pub fn write_option_date(&mut self, tag: &str, value: DateStamp) -> bool {
        self.write_option(tag, &OptionValue::Date(value))
    }

    pub fn write_option_unsigned_array(&mut self, tag: &str, values: &[u32]) -> bool {
        self.write_option(tag, &OptionValue::UnsignedArray(values.to_vec()))
    }

    // ── Read: sections and chunks ───────────────────────────────────────────

    /// Open the next section of `kind`.  `false` when none remains; that
    /// alone does not put the handle into the error state.
    pub fn open_section(&mut self, kind: SectionType) -> bool {
        self.with_modern(|r| r.open_section(kind)).flatten().is_some()
    }

    pub fn close_section(&mut self) -> bool {
        self.with_modern(|r| r.close_section()).is_some()
    }

    pub fn open_chunk(&mut self, kind: ChunkType) -> bool {
        self.with_modern(|r| r.open_chunk(kind)).flatten().is_some()
    }

    pub fn close_chunk(&mut self) -> bool {
        self.with_modern(|r| r.close_chunk()).is_some()
    }

    /// Payload size of the open chunk; 0 when no chunk is open.
    pub fn chunk_size(&self) -> u32 {
        match (&self.error, &self.backend) {
            (None, Some(Backend::Modern(r))) => r.chunk_size().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn read_raw(&mut self, buf: &mut [u8]) -> bool {
        self.with_modern(|r| r.read_raw(buf)).is_some()
    }

    pub fn current_section(&self) -> Option<u64> {
        match &self.backend {
            Some(Backend::Modern(r)) => r.current_section(),
            Some(Backend::Legacy(r)) => r.current_section(),
            Some(Backend::Writer(w)) => w.open_section(),
            None                     => None,
        }
    }

    pub fn current_chunk(&self) -> Option<u64> {
        match &self.backend {
            Some(Backend::Modern(r)) => r.current_chunk(),
            Some(Backend::Writer(w)) => w.open_chunk(),
            _                        => None,
        }
    }

    pub fn structure(&self) -> Option<&StructureReport> {
        match &self.backend {
            Some(Backend::Modern(r)) => Some(r.report()),
            _                        => None,
        }
    }

    pub fn legacy_structure(&self) -> Option<&LegacyReport> {
        match &self.backend {
            Some(Backend::Legacy(r)) => Some(r.report()),
            _                        => None,
        }
    }

    // ── Read: options ───────────────────────────────────────────────────────

    /// Read the first option with this kind and tag from the open chunk.
    /// `None` when absent or when the handle is in error.
    pub fn read_option(&mut self, kind: OptionKind, tag: &str) -> Option<OptionValue> {
        self.with_modern(|r| r.read_option(kind, OptionTag::new(tag)?))
            .flatten()
    }

    pub fn read_option_boolean(&mut self, tag: &str) -> Option<bool> {
        match self.read_option(OptionKind::Boolean, tag)? {
            OptionValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn read_option_unsigned(&mut self, tag: &str) -> Option<u32> {
        match self.read_option(OptionKind::Unsigned, tag)? {
            OptionValue::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn read_option_string(&mut self, tag: &str) -> Option<String> {
        match self.read_option(OptionKind::String, tag)? {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn read_option_date(&mut self, tag: &str) -> Option<DateStamp> {
        match self.read_option(OptionKind::Date, tag)? {
            OptionValue::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Read an unsigned array, appending `terminator` after the stored
    /// values when one is given.
    pub fn read_option_unsigned_array(&mut self, tag: &str, terminator: Option<u32>) -> Option<Vec<u32>> {
        match self.read_option(OptionKind::UnsignedArray, tag)? {
            OptionValue::UnsignedArray(mut values) => {
                values.extend(terminator);
                Some(values)
            }
            _ => None,
        }
    }

    /// Every record in the open chunk, in file order.
    pub fn options(&mut self) -> Option<Vec<OptionEntry>> {
        self.with_modern(|r| r.options())
    }

    // ── Read: legacy generations ────────────────────────────────────────────

    /// Open the legacy section at zero-based position `index`.
    pub fn open_legacy_section(&mut self, index: usize) -> bool {
        self.with_legacy(|r| r.open_section(index)).unwrap_or(false)
    }

    pub fn legacy_section_size(&self) -> Option<u32> {
        match (&self.error, &self.backend) {
            (None, Some(Backend::Legacy(r))) => r.section_size(),
            _ => None,
        }
    }

    pub fn read_legacy_word(&mut self) -> Option<i32> {
        self.with_legacy(|r| r.read_word())
    }

    pub fn read_legacy_string(&mut self, limit: usize) -> Option<String> {
        self.with_legacy(|r| r.read_string(limit))
    }

    pub fn read_legacy_string_flex(&mut self) -> Option<String> {
        self.with_legacy(|r| r.read_string_flex())
    }
}

impl Drop for DiscFile {
    fn drop(&mut self) {
        if let Some(error) = &self.error {
            warn!(path = %self.path.display(), %error, "discfile dropped with an unreported error");
        } else if matches!(self.backend, Some(Backend::Writer(_))) {
            warn!(path = %self.path.display(), "discfile dropped without close");
        }
    }
}

fn read_only()  -> DiscFileError { DiscFileError::structural("handle is open for reading") }
fn write_only() -> DiscFileError { DiscFileError::structural("handle is open for writing") }
