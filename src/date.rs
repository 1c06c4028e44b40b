//! 40-bit timestamps as stored by date options.
//!
//! A [`DateStamp`] counts centiseconds since 1900-01-01 00:00:00 UTC in
//! 40 bits.  On disk it occupies two words: the low 32 bits, then the top
//! byte widened to a full word.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MASK_40: u64 = (1 << 40) - 1;

/// Seconds between 1900-01-01 and the Unix epoch.
const EPOCH_OFFSET_SECS: i64 = 2_208_988_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DateStamp(u64);

impl DateStamp {
    /// Build from a raw centisecond count; bits above 40 are discarded.
    pub const fn new(centiseconds: u64) -> Self {
        Self(centiseconds & MASK_40)
    }

    pub const fn centiseconds(self) -> u64 {
        self.0
    }

    /// `(low word, high byte as word)`.
    pub const fn to_words(self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32 & 0xff)
    }

    pub const fn from_words(low: u32, high: u32) -> Self {
        Self(((high as u64 & 0xff) << 32) | low as u64)
    }

    /// `None` for instants before 1900 or past the 40-bit range.
    pub fn from_datetime(when: DateTime<Utc>) -> Option<Self> {
        let secs = when.timestamp().checked_add(EPOCH_OFFSET_SECS)?;
        if secs < 0 {
            return None;
        }
        let cs = (secs as u64)
            .checked_mul(100)?
            .checked_add(u64::from(when.timestamp_subsec_millis() / 10))?;
        (cs <= MASK_40).then_some(Self(cs))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let secs = (self.0 / 100) as i64 - EPOCH_OFFSET_SECS;
        let nanos = (self.0 % 100) as u32 * 10_000_000;
        DateTime::<Utc>::from_timestamp(secs, nanos)
    }

    pub fn now() -> Option<Self> {
        Self::from_datetime(Utc::now())
    }
}
