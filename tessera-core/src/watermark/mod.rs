//! Invisible pixel-domain watermark.
//!
//! The watermark carries an 8-byte payload: the signer's 4-byte short code
//! followed by a 4-byte timestamp code. It survives moderate lossy
//! re-encoding, unlike the metadata channel.
//!
//! # Components
//!
//! - [`WatermarkTransform`] - the frequency-domain embed/decode oracle
//! - [`AdaptiveEmbedder`] - tries progressively stronger strategies and keeps
//!   the first one that survives a JPEG pass
//! - [`WatermarkScanner`] - decodes a payload and resolves it to an identity
//!
//! # Usage
//!
//! ```no_run
//! use tessera_core::{
//!     CandidatePool, DwtDctTransform, LocalIdentity, ProvenanceConfig, WatermarkScanner,
//! };
//! use tessera_core::keys::{ContactBook, KeyStore};
//!
//! let me = LocalIdentity::generate("Alice");
//! let pool = CandidatePool::new(me.candidate(), &ContactBook::new());
//! let config = ProvenanceConfig::default();
//!
//! let image = image::open("photo.png").unwrap().to_rgb8();
//! let scanner = WatermarkScanner::new(&DwtDctTransform, &pool, config.match_tolerance_bits);
//! println!("{:?}", scanner.scan(&image));
//! ```

pub mod embedder;
pub mod scanner;
pub mod texture;
pub mod transform;

pub use embedder::{AdaptiveEmbedder, EmbedMode, EmbedOutcome, Strategy};
pub use scanner::{ScanOutcome, WatermarkScanner};
pub use transform::{DwtDctTransform, TransformError, WatermarkTransform};

use chrono::{DateTime, Utc};

use crate::identity::{short_hash, ShortCode, SHORT_CODE_LEN};
use crate::timecode::{TimeCode, TIMECODE_LEN};

/// Payload size in bytes (64 watermark bits).
pub const PAYLOAD_LEN: usize = SHORT_CODE_LEN + TIMECODE_LEN;

/// The bytes carried by a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPayload {
    pub identity: ShortCode,
    pub time: TimeCode,
}

impl WatermarkPayload {
    pub fn new(public_key: &[u8], instant: DateTime<Utc>) -> Self {
        Self {
            identity: short_hash(public_key),
            time: TimeCode::encode(instant),
        }
    }

    /// Identity code followed by timestamp code.
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out[..SHORT_CODE_LEN].copy_from_slice(&self.identity);
        out[SHORT_CODE_LEN..].copy_from_slice(self.time.as_bytes());
        out
    }
}
