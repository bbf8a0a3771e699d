//! Dual-channel verification.
//!
//! Both channels are read independently and then folded into one verdict:
//!
//! 1. The metadata channel speaks first. A valid signature over matching
//!    pixels gives `TRUSTED` or `UNKNOWN_AUTHOR`; a valid signature over
//!    different pixels is `TAMPERED` and nothing can override it.
//! 2. The watermark only fills the gap when metadata established nothing
//!    (stripped, corrupted, or absent). Its timestamp is approximate.
//!
//! Verification never fails: unreadable input becomes an `INVALID` report.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::attestation::pixel_hash;
use crate::config::ProvenanceConfig;
use crate::container::{EnvelopeLookup, MetadataChannel};
use crate::error::{Result, TesseraError};
use crate::keys::CandidatePool;
use crate::timecode::MarkTime;
use crate::watermark::{ScanOutcome, WatermarkScanner, WatermarkTransform};

/// Final trust verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustStatus {
    NoSig,
    Trusted,
    UnknownAuthor,
    Tampered,
    Invalid,
}

impl fmt::Display for TrustStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSig => "NO_SIG",
            Self::Trusted => "TRUSTED",
            Self::UnknownAuthor => "UNKNOWN_AUTHOR",
            Self::Tampered => "TAMPERED",
            Self::Invalid => "INVALID",
        })
    }
}

/// What the metadata channel established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFinding {
    Missing,
    /// Envelope present but malformed or its signature does not verify.
    Corrupted,
    /// Signature verifies and pixels match.
    Valid {
        /// Trusted name when the signer is known, otherwise the claimed author.
        author: String,
        trusted: bool,
        timestamp: String,
    },
    /// Signature verifies but the pixels changed since signing.
    PixelsModified,
}

impl MetadataFinding {
    pub fn report_line(&self) -> String {
        match self {
            Self::Missing => "Metadata: Missing".to_string(),
            Self::Corrupted => "Metadata: CORRUPTED".to_string(),
            Self::Valid { author, .. } => format!("Metadata: VALID ({author})"),
            Self::PixelsModified => "Metadata: INVALID (Pixels Modified)".to_string(),
        }
    }
}

fn watermark_line(outcome: &ScanOutcome) -> String {
    match outcome {
        ScanOutcome::Identified { display_name, .. } => {
            format!("Deep Embed: FOUND ({display_name})")
        }
        ScanOutcome::Orphan { raw_identity, .. } => {
            let prefix: String = raw_identity.chars().take(6).collect();
            format!("Deep Embed: UNKNOWN ID ({prefix}...)")
        }
        ScanOutcome::NoSignal => "Deep Embed: Missing".to_string(),
    }
}

/// Timestamp attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTimestamp {
    /// Signed metadata timestamp.
    Exact(String),
    /// Watermark tick, accurate to 5 minutes.
    Approximate(MarkTime),
    Unknown,
}

impl fmt::Display for ResolvedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(ts) => f.write_str(ts),
            Self::Approximate(time) => write!(f, "~{time}"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Result of verifying one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub status: TrustStatus,
    pub metadata: Option<MetadataFinding>,
    pub watermark: Option<ScanOutcome>,
    pub timestamp: ResolvedTimestamp,
    /// Human-readable channel report, one line per channel.
    pub message: String,
}

impl VerificationReport {
    fn invalid(reason: impl fmt::Display) -> Self {
        Self {
            status: TrustStatus::Invalid,
            metadata: None,
            watermark: None,
            timestamp: ResolvedTimestamp::Unknown,
            message: format!("Verification Error: {reason}"),
        }
    }

    /// Name of the author the verdict points to, if any.
    pub fn author(&self) -> Option<&str> {
        if let Some(MetadataFinding::Valid { author, .. }) = &self.metadata {
            return Some(author);
        }
        match &self.watermark {
            Some(ScanOutcome::Identified { display_name, .. }) => Some(display_name),
            _ => None,
        }
    }
}

/// Fold both channel findings into a status and timestamp.
pub fn fuse(
    metadata: &MetadataFinding,
    watermark: &ScanOutcome,
) -> (TrustStatus, ResolvedTimestamp) {
    let (mut status, mut timestamp) = match metadata {
        MetadataFinding::Valid { trusted, timestamp, .. } => (
            if *trusted {
                TrustStatus::Trusted
            } else {
                TrustStatus::UnknownAuthor
            },
            ResolvedTimestamp::Exact(timestamp.clone()),
        ),
        MetadataFinding::PixelsModified => (TrustStatus::Tampered, ResolvedTimestamp::Unknown),
        MetadataFinding::Missing | MetadataFinding::Corrupted => {
            (TrustStatus::NoSig, ResolvedTimestamp::Unknown)
        }
    };

    if status == TrustStatus::NoSig {
        match watermark {
            ScanOutcome::Identified { time, .. } => {
                status = TrustStatus::Trusted;
                timestamp = ResolvedTimestamp::Approximate(*time);
            }
            ScanOutcome::Orphan { time, .. } => {
                status = TrustStatus::UnknownAuthor;
                timestamp = ResolvedTimestamp::Approximate(MarkTime::At(*time));
            }
            ScanOutcome::NoSignal => {}
        }
    }

    (status, timestamp)
}

/// Checks images against a pool of trusted identities.
pub struct Verifier<'a> {
    pool: &'a CandidatePool,
    transform: &'a dyn WatermarkTransform,
    config: &'a ProvenanceConfig,
    channel: MetadataChannel,
}

impl<'a> Verifier<'a> {
    pub fn new(
        pool: &'a CandidatePool,
        transform: &'a dyn WatermarkTransform,
        config: &'a ProvenanceConfig,
    ) -> Self {
        Self {
            pool,
            transform,
            config,
            channel: MetadataChannel::new(config.metadata_tag.clone()),
        }
    }

    /// Verify encoded image bytes.
    pub fn verify(&self, data: &[u8]) -> VerificationReport {
        match self.try_verify(data) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Verification failed");
                VerificationReport::invalid(e)
            }
        }
    }

    fn try_verify(&self, data: &[u8]) -> Result<VerificationReport> {
        let image =
            image::load_from_memory(data).map_err(|e| TesseraError::ImageRead(e.to_string()))?;

        let metadata = self.check_metadata(data, &image);
        let scanner =
            WatermarkScanner::new(self.transform, self.pool, self.config.match_tolerance_bits);
        let watermark = scanner.scan(&image.to_rgb8());
        let (status, timestamp) = fuse(&metadata, &watermark);
        debug!(%status, ?metadata, ?watermark, "Channels fused");

        let unsigned = metadata == MetadataFinding::Missing && watermark == ScanOutcome::NoSignal;
        let message = if unsigned {
            "No provenance signature found.".to_string()
        } else {
            format!("{}\n{}", metadata.report_line(), watermark_line(&watermark))
        };

        Ok(VerificationReport {
            status,
            metadata: Some(metadata),
            watermark: Some(watermark),
            timestamp,
            message,
        })
    }

    fn check_metadata(&self, data: &[u8], image: &image::DynamicImage) -> MetadataFinding {
        let envelope = match self.channel.load(data) {
            EnvelopeLookup::Found(envelope) => envelope,
            EnvelopeLookup::Missing => return MetadataFinding::Missing,
            EnvelopeLookup::Malformed(_) => return MetadataFinding::Corrupted,
        };

        if !envelope.verify_signature() {
            debug!("Envelope signature does not verify");
            return MetadataFinding::Corrupted;
        }

        if pixel_hash(image) != envelope.payload.pixel_hash {
            debug!("Pixel hash mismatch");
            return MetadataFinding::PixelsModified;
        }

        let trusted = self.pool.trusted_name(&envelope.signer_fingerprint());
        MetadataFinding::Valid {
            author: trusted.map_or_else(|| envelope.payload.author.clone(), str::to_string),
            trusted: trusted.is_some(),
            timestamp: envelope.payload.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn valid(trusted: bool) -> MetadataFinding {
        MetadataFinding::Valid {
            author: "Alice".into(),
            trusted,
            timestamp: "2026-05-01T12:00:00.000000".into(),
        }
    }

    fn identified() -> ScanOutcome {
        ScanOutcome::Identified {
            display_name: "Alice".into(),
            fingerprint: "ab".repeat(32),
            distance: 1,
            time: MarkTime::At(Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()),
        }
    }

    fn orphan() -> ScanOutcome {
        ScanOutcome::Orphan {
            raw_identity: "61626364".into(),
            time: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_valid_metadata_wins_over_watermark() {
        let (status, ts) = fuse(&valid(true), &orphan());
        assert_eq!(status, TrustStatus::Trusted);
        assert_eq!(ts.to_string(), "2026-05-01T12:00:00.000000");

        let (status, _) = fuse(&valid(false), &identified());
        assert_eq!(status, TrustStatus::UnknownAuthor);
    }

    #[test]
    fn test_tampered_is_terminal() {
        for watermark in [identified(), orphan(), ScanOutcome::NoSignal] {
            assert_eq!(fuse(&MetadataFinding::PixelsModified, &watermark).0, TrustStatus::Tampered);
        }
    }

    #[test]
    fn test_watermark_fills_gap() {
        for metadata in [MetadataFinding::Missing, MetadataFinding::Corrupted] {
            let (status, ts) = fuse(&metadata, &identified());
            assert_eq!(status, TrustStatus::Trusted);
            assert_eq!(ts.to_string(), "~2026-05-01 12:00");

            let (status, ts) = fuse(&metadata, &orphan());
            assert_eq!(status, TrustStatus::UnknownAuthor);
            assert_eq!(ts.to_string(), "~2026-05-01 12:00");
        }
    }

    #[test]
    fn test_corrupted_watermark_time() {
        let watermark = ScanOutcome::Identified {
            display_name: "Alice".into(),
            fingerprint: "ab".repeat(32),
            distance: 0,
            time: MarkTime::Corrupted,
        };
        let (_, ts) = fuse(&MetadataFinding::Missing, &watermark);
        assert_eq!(ts.to_string(), "~Corrupted Time");
    }

    #[test]
    fn test_nothing_found() {
        let (status, ts) = fuse(&MetadataFinding::Missing, &ScanOutcome::NoSignal);
        assert_eq!(status, TrustStatus::NoSig);
        assert_eq!(ts, ResolvedTimestamp::Unknown);
    }

    #[test]
    fn test_report_lines() {
        assert_eq!(valid(true).report_line(), "Metadata: VALID (Alice)");
        assert_eq!(
            MetadataFinding::PixelsModified.report_line(),
            "Metadata: INVALID (Pixels Modified)"
        );
        assert_eq!(watermark_line(&identified()), "Deep Embed: FOUND (Alice)");
        assert_eq!(watermark_line(&orphan()), "Deep Embed: UNKNOWN ID (616263...)");
        assert_eq!(watermark_line(&ScanOutcome::NoSignal), "Deep Embed: Missing");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TrustStatus::NoSig.to_string(), "NO_SIG");
        assert_eq!(TrustStatus::UnknownAuthor.to_string(), "UNKNOWN_AUTHOR");
        assert_eq!(serde_json::to_value(TrustStatus::Tampered).unwrap(), "TAMPERED");
    }

    #[test]
    fn test_garbage_is_invalid() {
        let pool = CandidatePool::default();
        let config = ProvenanceConfig::default();
        let verifier = Verifier::new(&pool, &crate::watermark::DwtDctTransform, &config);
        let report = verifier.verify(b"definitely not an image");
        assert_eq!(report.status, TrustStatus::Invalid);
        assert!(report.message.starts_with("Verification Error:"));
    }
}
