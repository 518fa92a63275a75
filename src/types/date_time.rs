//! Protocol timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::constants::{TICKS_PER_SECOND, UNIX_EPOCH_OFFSET_SECS};
use crate::core::CodecError;

/// A count of 100-nanosecond ticks since 1601-01-01 UTC.
///
/// Values before the epoch clamp to zero on encode; the protocol does
/// not represent earlier instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime {
    ticks: i64,
}

impl DateTime {
    /// The protocol epoch, 1601-01-01 UTC.
    pub const EPOCH: Self = Self { ticks: 0 };

    /// Construct from a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    /// Construct from Unix wall-clock seconds and a nanosecond remainder.
    ///
    /// Sub-tick precision (the nanosecond remainder modulo 100) is lost.
    pub fn from_unix_parts(secs: i64, nanos: u32) -> Self {
        let ticks = (UNIX_EPOCH_OFFSET_SECS + secs) * TICKS_PER_SECOND + i64::from(nanos) / 100;
        Self { ticks }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Self::from_unix_parts(d.as_secs() as i64, d.subsec_nanos()),
            // A clock before 1970 clamps to the Unix epoch.
            Err(_) => Self::from_unix_parts(0, 0),
        }
    }

    /// The raw tick count.
    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    /// Unix wall-clock seconds (truncating).
    pub fn as_unix_secs(self) -> i64 {
        self.ticks / TICKS_PER_SECOND - UNIX_EPOCH_OFFSET_SECS
    }

    /// This instant shifted forward by `ms` milliseconds.
    pub fn add_millis(self, ms: u64) -> Self {
        Self {
            ticks: self.ticks.saturating_add(ms as i64 * 10_000),
        }
    }

    /// Whole milliseconds elapsed since `earlier` (zero if negative).
    pub fn millis_since(self, earlier: Self) -> u64 {
        ((self.ticks - earlier.ticks).max(0) / 10_000) as u64
    }
}

impl BinaryEncode for DateTime {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        // The wire format cannot express instants before the epoch.
        self.ticks.max(0).encode(buf)
    }
}

impl BinaryDecode for DateTime {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            ticks: i64::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_unix_conversion() {
        let dt = DateTime::from_unix_parts(1_000_000, 0);
        assert_eq!(dt.as_unix_secs(), 1_000_000);
        assert_eq!(
            dt.ticks(),
            (UNIX_EPOCH_OFFSET_SECS + 1_000_000) * TICKS_PER_SECOND
        );
    }

    #[test]
    fn test_nanosecond_remainder() {
        let dt = DateTime::from_unix_parts(0, 1_234);
        assert_eq!(dt.ticks() % TICKS_PER_SECOND, 12);
    }

    #[test]
    fn test_round_trip() {
        let dt = DateTime::from_unix_parts(1_700_000_000, 123_456_700);
        let mut buf = Buffer::new();
        dt.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(DateTime::decode(&mut buf).unwrap(), dt);
    }

    #[test]
    fn test_pre_epoch_clamps_to_zero() {
        let dt = DateTime::from_ticks(-5);
        let mut buf = Buffer::new();
        dt.encode(&mut buf).unwrap();
        assert_eq!(DateTime::decode(&mut buf).unwrap(), DateTime::EPOCH);
    }

    #[test]
    fn test_millis_arithmetic() {
        let start = DateTime::from_unix_parts(100, 0);
        let later = start.add_millis(1_500);
        assert_eq!(later.millis_since(start), 1_500);
        assert_eq!(start.millis_since(later), 0);
    }

    #[test]
    fn test_now_is_after_2020() {
        let y2020 = DateTime::from_unix_parts(1_577_836_800, 0);
        assert!(DateTime::now() > y2020);
    }
}
