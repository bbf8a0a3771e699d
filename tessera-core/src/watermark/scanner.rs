//! Watermark scanner.
//!
//! Decodes the 8-byte payload and resolves its identity code against a
//! [`CandidatePool`]. A code that matches nobody but carries a well-formed
//! timestamp is reported as an orphan: a watermark from an unknown author.

use chrono::{DateTime, Utc};
use image::RgbImage;
use tracing::debug;

use super::transform::{crop_to_even, WatermarkTransform};
use super::PAYLOAD_LEN;
use crate::identity::{match_best, SHORT_CODE_LEN};
use crate::keys::CandidatePool;
use crate::timecode::{decode as decode_time, MarkTime};

/// What a scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The identity code matched a known candidate.
    Identified {
        display_name: String,
        fingerprint: String,
        distance: u32,
        time: MarkTime,
    },
    /// A plausible watermark from nobody in the pool.
    Orphan {
        /// Hex of the 4 decoded identity bytes.
        raw_identity: String,
        time: DateTime<Utc>,
    },
    NoSignal,
}

impl ScanOutcome {
    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified { .. })
    }
}

/// Decodes and resolves watermarks.
pub struct WatermarkScanner<'a> {
    transform: &'a dyn WatermarkTransform,
    pool: &'a CandidatePool,
    tolerance_bits: u32,
}

impl<'a> WatermarkScanner<'a> {
    pub fn new(
        transform: &'a dyn WatermarkTransform,
        pool: &'a CandidatePool,
        tolerance_bits: u32,
    ) -> Self {
        Self {
            transform,
            pool,
            tolerance_bits,
        }
    }

    /// Scan encoded image bytes. Undecodable data is `NoSignal`.
    pub fn scan_bytes(&self, data: &[u8]) -> ScanOutcome {
        match image::load_from_memory(data) {
            Ok(image) => self.scan(&image.to_rgb8()),
            Err(e) => {
                debug!(error = %e, "Scan input is not a readable image");
                ScanOutcome::NoSignal
            }
        }
    }

    /// Scan decoded pixels. Odd dimensions are cropped the same way the
    /// embedder crops them.
    pub fn scan(&self, image: &RgbImage) -> ScanOutcome {
        let image = crop_to_even(image);
        match self.transform.decode(&image, PAYLOAD_LEN) {
            Ok(raw) => self.resolve(&raw),
            Err(e) => {
                debug!(error = %e, "Watermark decode failed");
                ScanOutcome::NoSignal
            }
        }
    }

    /// Interpret a decoded payload.
    pub fn resolve(&self, raw: &[u8]) -> ScanOutcome {
        if raw.len() < PAYLOAD_LEN {
            return ScanOutcome::NoSignal;
        }
        let payload = &raw[..PAYLOAD_LEN];
        // All-zero and all-one payloads are what blank or saturated images decode to.
        if payload.iter().all(|&b| b == 0x00) || payload.iter().all(|&b| b == 0xFF) {
            return ScanOutcome::NoSignal;
        }
        let (identity, time) = payload.split_at(SHORT_CODE_LEN);

        if let Some(found) = match_best(identity, self.pool.candidates(), self.tolerance_bits) {
            debug!(name = %found.display_name, distance = found.distance, "Watermark identified");
            return ScanOutcome::Identified {
                display_name: found.display_name,
                fingerprint: found.fingerprint,
                distance: found.distance,
                time: MarkTime::from_code(time),
            };
        }

        let blank = identity.iter().all(|&b| b == 0x00) || identity.iter().all(|&b| b == 0xFF);
        match decode_time(time) {
            Ok(time) if !blank => ScanOutcome::Orphan {
                raw_identity: hex::encode(identity),
                time,
            },
            _ => ScanOutcome::NoSignal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Candidate;
    use crate::timecode::epoch;
    use crate::watermark::{DwtDctTransform, WatermarkPayload};
    use image::Rgb;

    fn alice() -> Candidate {
        Candidate::new("Alice", vec![1u8; 32])
    }

    fn pool() -> CandidatePool {
        CandidatePool::from_candidates(vec![alice()])
    }

    #[test]
    fn test_resolve_known_identity() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        let raw = WatermarkPayload::new(&alice().public_key, epoch()).to_bytes();

        match scanner.resolve(&raw) {
            ScanOutcome::Identified { display_name, distance, time, .. } => {
                assert_eq!(display_name, "Alice");
                assert_eq!(distance, 0);
                assert_eq!(time, MarkTime::At(epoch()));
            }
            other => panic!("expected identified, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_identified_with_corrupted_time() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        let mut raw = alice().short_code().to_vec();
        raw.extend_from_slice(&[0xFF; 4]);

        assert!(matches!(
            scanner.resolve(&raw),
            ScanOutcome::Identified { time: MarkTime::Corrupted, .. }
        ));
    }

    #[test]
    fn test_resolve_orphan() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        let stranger = Candidate::new("Stranger", vec![0xAB; 32]);
        let raw = WatermarkPayload::new(&stranger.public_key, epoch()).to_bytes();

        assert_eq!(
            scanner.resolve(&raw),
            ScanOutcome::Orphan {
                raw_identity: hex::encode(stranger.short_code()),
                time: epoch(),
            }
        );
    }

    #[test]
    fn test_resolve_noise_is_no_signal() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        assert_eq!(scanner.resolve(&[0u8; 8]), ScanOutcome::NoSignal);
        assert_eq!(scanner.resolve(&[0xFF; 8]), ScanOutcome::NoSignal);
        assert_eq!(scanner.resolve(b"zzzz!!!!"), ScanOutcome::NoSignal);
        assert_eq!(scanner.resolve(b"abc"), ScanOutcome::NoSignal);
    }

    #[test]
    fn test_blank_identity_with_valid_time_is_no_signal() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        let mut raw = vec![0u8; 4];
        raw.extend_from_slice(b"0000");
        assert_eq!(scanner.resolve(&raw), ScanOutcome::NoSignal);
    }

    #[test]
    fn test_scan_embedded_image() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        let image = RgbImage::from_pixel(96, 96, Rgb([128, 128, 128]));
        let payload = WatermarkPayload::new(&alice().public_key, epoch()).to_bytes();
        let marked = DwtDctTransform.embed(&image, &payload, 36).unwrap();

        assert!(scanner.scan(&marked).is_identified());
        assert_eq!(scanner.scan(&image), ScanOutcome::NoSignal);
    }

    #[test]
    fn test_scan_garbage_bytes() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        assert_eq!(scanner.scan_bytes(b"not an image"), ScanOutcome::NoSignal);
    }

    #[test]
    fn test_scan_tiny_image() {
        let pool = pool();
        let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, 6);
        assert_eq!(scanner.scan(&RgbImage::new(3, 3)), ScanOutcome::NoSignal);
    }
}
