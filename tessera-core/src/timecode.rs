//! Compact timestamp codes.
//!
//! Wall-clock time is quantized into 5-minute ticks since 2025-01-01T00:00:00
//! UTC and written as four lowercase base-36 digits, most significant first.
//! Four digits cover 36^4 ticks (about 3.2 years); later instants wrap around
//! and decode to a time inside the first window.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Number of characters in a timestamp code.
pub const TIMECODE_LEN: usize = 4;

/// Minutes per tick.
pub const TICK_MINUTES: i64 = 5;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RADIX: i64 = 36;
const WINDOW_TICKS: i64 = RADIX * RADIX * RADIX * RADIX;
const EPOCH_UNIX_SECS: i64 = 1_735_689_600;

/// Error returned when a code cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptedTimeError {
    #[error("timestamp code has length {0}, expected {TIMECODE_LEN}")]
    WrongLength(usize),

    #[error("timestamp code contains non base-36 byte 0x{0:02x}")]
    InvalidDigit(u8),
}

/// The codec epoch, 2025-01-01T00:00:00 UTC.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(EPOCH_UNIX_SECS)
}

/// A 4-byte ASCII timestamp code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeCode([u8; TIMECODE_LEN]);

impl TimeCode {
    /// Encode an instant. Always succeeds; instants outside the window wrap.
    pub fn encode(instant: DateTime<Utc>) -> Self {
        let minutes = (instant - epoch()).num_minutes();
        let mut ticks = minutes.div_euclid(TICK_MINUTES).rem_euclid(WINDOW_TICKS);

        let mut digits = [b'0'; TIMECODE_LEN];
        for slot in digits.iter_mut().rev() {
            *slot = ALPHABET[(ticks % RADIX) as usize];
            ticks /= RADIX;
        }
        Self(digits)
    }

    /// Parse raw bytes into a code, validating length and alphabet.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptedTimeError> {
        if bytes.len() != TIMECODE_LEN {
            return Err(CorruptedTimeError::WrongLength(bytes.len()));
        }
        let mut digits = [0u8; TIMECODE_LEN];
        for (slot, &b) in digits.iter_mut().zip(bytes) {
            if digit_value(b).is_none() {
                return Err(CorruptedTimeError::InvalidDigit(b));
            }
            *slot = b;
        }
        Ok(Self(digits))
    }

    /// Decode to the start of the 5-minute tick this code names.
    pub fn instant(&self) -> DateTime<Utc> {
        let ticks = self
            .0
            .iter()
            .filter_map(|&b| digit_value(b))
            .fold(0i64, |acc, d| acc * RADIX + d);
        epoch() + Duration::minutes(ticks * TICK_MINUTES)
    }

    pub fn as_bytes(&self) -> &[u8; TIMECODE_LEN] {
        &self.0
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Alphabet is ASCII, so this is lossless.
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Decode raw code bytes to an instant.
pub fn decode(code: &[u8]) -> Result<DateTime<Utc>, CorruptedTimeError> {
    TimeCode::from_bytes(code).map(|c| c.instant())
}

fn digit_value(b: u8) -> Option<i64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as i64),
        b'a'..=b'z' => Some((b - b'a') as i64 + 10),
        _ => None,
    }
}

/// A decoded watermark time: either a tick start or a corrupted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkTime {
    At(DateTime<Utc>),
    Corrupted,
}

impl MarkTime {
    pub fn from_code(code: &[u8]) -> Self {
        match decode(code) {
            Ok(t) => Self::At(t),
            Err(_) => Self::Corrupted,
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(t) => Some(*t),
            Self::Corrupted => None,
        }
    }
}

impl fmt::Display for MarkTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M")),
            Self::Corrupted => f.write_str("Corrupted Time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_epoch_encodes_to_zero() {
        assert_eq!(TimeCode::encode(epoch()).to_string(), "0000");
    }

    #[test]
    fn test_known_code() {
        // 2025-01-01 01:00 = 12 ticks = "000c"
        assert_eq!(TimeCode::encode(at(2025, 1, 1, 1, 0, 0)).to_string(), "000c");
        // One day = 288 ticks = 8 * 36 = "0080"
        assert_eq!(TimeCode::encode(at(2025, 1, 2, 0, 0, 0)).to_string(), "0080");
    }

    #[test]
    fn test_truncates_to_tick() {
        let t = at(2026, 3, 14, 15, 9, 26);
        assert_eq!(decode(TimeCode::encode(t).as_bytes()).unwrap(), at(2026, 3, 14, 15, 5, 0));
    }

    #[test]
    fn test_wraps_after_window() {
        let window_end = epoch() + Duration::minutes(WINDOW_TICKS * TICK_MINUTES);
        assert_eq!(TimeCode::encode(window_end).to_string(), "0000");
        assert_eq!(
            TimeCode::encode(window_end - Duration::minutes(TICK_MINUTES)).to_string(),
            "zzzz"
        );
    }

    #[test]
    fn test_wrong_length_is_corrupted() {
        assert_eq!(decode(b"abc"), Err(CorruptedTimeError::WrongLength(3)));
        assert_eq!(decode(b"abcde"), Err(CorruptedTimeError::WrongLength(5)));
        assert_eq!(decode(b""), Err(CorruptedTimeError::WrongLength(0)));
    }

    #[test]
    fn test_invalid_digits_are_corrupted() {
        assert_eq!(decode(b"00A0"), Err(CorruptedTimeError::InvalidDigit(b'A')));
        assert_eq!(decode(b"0-00"), Err(CorruptedTimeError::InvalidDigit(b'-')));
        assert_eq!(decode(&[0xff, 0, 0, 0]), Err(CorruptedTimeError::InvalidDigit(0xff)));
    }

    #[test]
    fn test_mark_time_display() {
        assert_eq!(MarkTime::from_code(b"000c").to_string(), "2025-01-01 01:00");
        assert_eq!(MarkTime::from_code(b"\0\0\0\0").to_string(), "Corrupted Time");
    }

    proptest! {
        #[test]
        fn prop_roundtrip_truncates_to_five_minutes(
            secs in 0i64..(WINDOW_TICKS * TICK_MINUTES * 60)
        ) {
            let t = epoch() + Duration::seconds(secs);
            let decoded = decode(TimeCode::encode(t).as_bytes()).unwrap();
            let expected = epoch() + Duration::minutes((secs / 60 / TICK_MINUTES) * TICK_MINUTES);
            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn prop_codes_use_alphabet(secs in 0i64..(WINDOW_TICKS * TICK_MINUTES * 60)) {
            let code = TimeCode::encode(epoch() + Duration::seconds(secs));
            prop_assert!(code.as_bytes().iter().all(|b| ALPHABET.contains(b)));
        }
    }
}
