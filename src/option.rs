//! Option records: tagged key/value pairs carried inside chunk payloads.
//!
//! Every record starts with an 8-byte header:
//!
//! ```text
//! id(4) | value_or_length(4) [ | payload(length bytes) ]
//! ```
//!
//! The identifier packs an [`OptionKind`] into its low byte and up to three
//! ASCII tag characters into bytes 1–3.  Boolean and unsigned values live in
//! the second word; strings, dates and unsigned arrays store a word-aligned
//! payload length there and the payload follows the header directly.

use byteorder::{ByteOrder, NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use tracing::warn;

use crate::date::DateStamp;
use crate::error::{DiscFileError, Result};
use crate::section::align4;

pub const RECORD_HEADER_SIZE: usize = 8;

// ── Kinds and tags ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OptionKind {
    Boolean       = 1,
    Unsigned      = 2,
    String        = 3,
    Date          = 4,
    UnsignedArray = 5,
}

impl OptionKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(OptionKind::Boolean),
            2 => Some(OptionKind::Unsigned),
            3 => Some(OptionKind::String),
            4 => Some(OptionKind::Date),
            5 => Some(OptionKind::UnsignedArray),
            _ => None,
        }
    }

    /// Whether the record's second word is a payload length.
    pub fn is_variable(self) -> bool {
        matches!(self, OptionKind::String | OptionKind::Date | OptionKind::UnsignedArray)
    }

    pub fn name(self) -> &'static str {
        match self {
            OptionKind::Boolean       => "boolean",
            OptionKind::Unsigned      => "unsigned",
            OptionKind::String        => "string",
            OptionKind::Date          => "date",
            OptionKind::UnsignedArray => "unsigned-array",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        [
            OptionKind::Boolean,
            OptionKind::Unsigned,
            OptionKind::String,
            OptionKind::Date,
            OptionKind::UnsignedArray,
        ]
        .into_iter()
        .find(|k| k.name().eq_ignore_ascii_case(s))
    }
}

/// Up to three ASCII characters, left aligned and zero padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionTag([u8; 3]);

impl OptionTag {
    pub fn new(tag: &str) -> Result<Self> {
        let bytes = tag.as_bytes();
        if bytes.is_empty()
            || bytes.len() > 3
            || !bytes.iter().all(|b| b.is_ascii_graphic())
        {
            return Err(DiscFileError::structural(format!("invalid option tag {tag:?}")));
        }
        let mut packed = [0u8; 3];
        packed[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(packed))
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> [u8; 3] {
        self.0
    }

    pub fn as_string(&self) -> String {
        self.0
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| *b as char)
            .collect()
    }
}

impl fmt::Debug for OptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionTag({:?})", self.as_string())
    }
}

impl fmt::Display for OptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// The 32-bit record identifier, unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionId {
    pub kind: OptionKind,
    pub tag:  OptionTag,
}

impl OptionId {
    pub fn new(kind: OptionKind, tag: OptionTag) -> Self {
        Self { kind, tag }
    }

    pub fn to_u32(self) -> u32 {
        let [a, b, c] = self.tag.0;
        u32::from_le_bytes([self.kind as u8, a, b, c])
    }

    pub fn from_u32(raw: u32) -> Result<Self> {
        let [kind, a, b, c] = raw.to_le_bytes();
        let kind = OptionKind::from_u8(kind).ok_or_else(|| {
            DiscFileError::structural(format!("unknown option kind {kind} in id {raw:#010x}"))
        })?;
        Ok(Self { kind, tag: OptionTag([a, b, c]) })
    }
}

// ── Record header ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub id:    u32,
    pub value: u32,
}

impl RecordHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<NativeEndian>(self.id)?;
        writer.write_u32::<NativeEndian>(self.value)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            id:    reader.read_u32::<NativeEndian>()?,
            value: reader.read_u32::<NativeEndian>()?,
        })
    }

    /// Bytes from the start of this record to the start of the next one.
    ///
    /// Kinds this reader does not know are skipped as variable-length
    /// records so that newer writers can add kinds.
    pub fn extent(&self) -> Result<u64> {
        let [kind, a, b, c] = self.id.to_le_bytes();
        match OptionKind::from_u8(kind) {
            Some(kind) if !kind.is_variable() => Ok(RECORD_HEADER_SIZE as u64),
            Some(_) if self.value % 4 != 0 => Err(DiscFileError::structural(format!(
                "option {} payload length {} is not word aligned",
                OptionTag([a, b, c]),
                self.value
            ))),
            Some(_) => Ok(RECORD_HEADER_SIZE as u64 + self.value as u64),
            None => Ok(RECORD_HEADER_SIZE as u64 + align4(self.value as u64)),
        }
    }
}

// ── Values ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    Boolean(bool),
    Unsigned(u32),
    String(String),
    Date(DateStamp),
    UnsignedArray(Vec<u32>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Boolean(_)       => OptionKind::Boolean,
            OptionValue::Unsigned(_)      => OptionKind::Unsigned,
            OptionValue::String(_)        => OptionKind::String,
            OptionValue::Date(_)          => OptionKind::Date,
            OptionValue::UnsignedArray(_) => OptionKind::UnsignedArray,
        }
    }

    /// Encode header and payload as one contiguous record.
    pub fn encode(&self, tag: OptionTag) -> Result<Vec<u8>> {
        let id = OptionId::new(self.kind(), tag).to_u32();
        let payload = self.encode_payload(tag)?;
        let value = match self {
            OptionValue::Boolean(b)  => u32::from(*b),
            OptionValue::Unsigned(v) => *v,
            _ => u32::try_from(payload.len()).map_err(|_| {
                DiscFileError::structural(format!("option {tag} payload too large"))
            })?,
        };

        let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        RecordHeader { id, value }.write(&mut out)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn encode_payload(&self, tag: OptionTag) -> Result<Vec<u8>> {
        match self {
            OptionValue::Boolean(_) | OptionValue::Unsigned(_) => Ok(Vec::new()),
            OptionValue::String(s) => {
                let bytes = s.as_bytes();
                if bytes.contains(&0) {
                    return Err(DiscFileError::structural(format!(
                        "option {tag} string contains a NUL byte"
                    )));
                }
                // Always leave room for at least one terminating zero.
                let mut payload = vec![0u8; align4(bytes.len() as u64 + 1) as usize];
                payload[..bytes.len()].copy_from_slice(bytes);
                Ok(payload)
            }
            OptionValue::Date(stamp) => {
                let (low, high) = stamp.to_words();
                let mut payload = Vec::with_capacity(8);
                payload.write_u32::<NativeEndian>(low)?;
                payload.write_u32::<NativeEndian>(high)?;
                Ok(payload)
            }
            OptionValue::UnsignedArray(values) => {
                let mut payload = Vec::with_capacity(values.len() * 4);
                for v in values {
                    payload.write_u32::<NativeEndian>(*v)?;
                }
                Ok(payload)
            }
        }
    }

    /// Rebuild a value from a record header and the payload that followed it.
    pub fn decode(header: &RecordHeader, payload: &[u8]) -> Result<Self> {
        let id = OptionId::from_u32(header.id)?;
        match id.kind {
            OptionKind::Boolean  => Ok(OptionValue::Boolean(header.value != 0)),
            OptionKind::Unsigned => Ok(OptionValue::Unsigned(header.value)),
            OptionKind::String   => {
                let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
                let text = match String::from_utf8(payload[..end].to_vec()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(tag = %id.tag, "option string is not valid UTF-8; decoding lossily");
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                Ok(OptionValue::String(text))
            }
            OptionKind::Date => {
                if payload.len() != 8 {
                    return Err(DiscFileError::structural(format!(
                        "date option {} has a {}-byte payload",
                        id.tag,
                        payload.len()
                    )));
                }
                let low = NativeEndian::read_u32(&payload[0..4]);
                let high = NativeEndian::read_u32(&payload[4..8]);
                Ok(OptionValue::Date(DateStamp::from_words(low, high)))
            }
            OptionKind::UnsignedArray => {
                let values = payload
                    .chunks_exact(4)
                    .map(NativeEndian::read_u32)
                    .collect();
                Ok(OptionValue::UnsignedArray(values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tag(s: &str) -> OptionTag {
        OptionTag::new(s).unwrap()
    }

    #[test]
    fn id_packs_kind_low_and_tag_left_aligned() {
        let id = OptionId::new(OptionKind::Unsigned, tag("HF"));
        assert_eq!(id.to_u32().to_le_bytes(), [2, b'H', b'F', 0]);
        assert_eq!(OptionId::from_u32(id.to_u32()).unwrap(), id);
    }

    #[test]
    fn bad_tags_are_rejected() {
        for bad in ["", "ABCD", "A B", "é"] {
            assert_eq!(OptionTag::new(bad).unwrap_err().kind(), ErrorKind::StructuralViolation);
        }
    }

    #[test]
    fn kind_names_round_trip() {
        assert_eq!(OptionKind::from_name("Unsigned-Array"), Some(OptionKind::UnsignedArray));
        assert_eq!(OptionKind::from_name(OptionKind::Date.name()), Some(OptionKind::Date));
        assert_eq!(OptionKind::from_name("float"), None);
    }

    #[test]
    fn fixed_kinds_are_eight_bytes() {
        let rec = OptionValue::Boolean(true).encode(tag("BO")).unwrap();
        assert_eq!(rec.len(), RECORD_HEADER_SIZE);
        let header = RecordHeader::read(&rec[..]).unwrap();
        assert_eq!(header.value, 1);
        assert_eq!(header.extent().unwrap(), 8);
    }

    #[test]
    fn strings_are_terminated_and_word_aligned() {
        let rec = OptionValue::String("abcd".into()).encode(tag("STR")).unwrap();
        // "abcd" + NUL rounds up to 8 bytes of payload.
        assert_eq!(rec.len(), RECORD_HEADER_SIZE + 8);
        let header = RecordHeader::read(&rec[..]).unwrap();
        assert_eq!(header.value, 8);
        assert_eq!(&rec[8..], b"abcd\0\0\0\0");
        let value = OptionValue::decode(&header, &rec[8..]).unwrap();
        assert_eq!(value, OptionValue::String("abcd".into()));
    }

    #[test]
    fn strings_with_nul_cannot_be_encoded() {
        let err = OptionValue::String("a\0b".into()).encode(tag("S")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    }

    #[test]
    fn unaligned_variable_length_is_structural() {
        let header = RecordHeader {
            id:    OptionId::new(OptionKind::String, tag("S")).to_u32(),
            value: 5,
        };
        assert_eq!(header.extent().unwrap_err().kind(), ErrorKind::StructuralViolation);
    }

    #[test]
    fn unknown_kinds_are_skipped_as_variable_records() {
        let header = RecordHeader { id: u32::from_le_bytes([6, b'N', b'E', b'W']), value: 6 };
        assert_eq!(header.extent().unwrap(), 8 + 8);
        assert!(OptionId::from_u32(header.id).is_err());
    }

    #[test]
    fn date_payload_must_be_two_words() {
        let header = RecordHeader {
            id:    OptionId::new(OptionKind::Date, tag("D")).to_u32(),
            value: 4,
        };
        let err = OptionValue::decode(&header, &[0; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    }
}
