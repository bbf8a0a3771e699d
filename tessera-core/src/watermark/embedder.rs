//! Adaptive watermark embedding with self-verification.
//!
//! Embedding strength is a trade-off between visibility and robustness, and
//! the right point depends on the image. The embedder builds a ladder of
//! strategies for the image at hand, tries them weakest first, and keeps the
//! first result that still scans as the signer after a JPEG round trip. When
//! nothing survives, the clean pixels are kept and only the metadata channel
//! carries provenance.
//!
//! The output is always a lossless PNG signed over its final pixels.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use super::scanner::{ScanOutcome, WatermarkScanner};
use super::texture::{add_gaussian_noise, image_stats, is_safe_for_noise};
use super::transform::{crop_to_even, WatermarkTransform};
use super::WatermarkPayload;
use crate::attestation::SignedEnvelope;
use crate::config::ProvenanceConfig;
use crate::container::MetadataChannel;
use crate::error::{Result, TesseraError};
use crate::identity::fingerprint;
use crate::keys::{CandidatePool, KeyStore, TrustStore};

/// Noise level and embedding strength for one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strategy {
    /// Standard deviation of the gaussian noise added before embedding.
    pub noise_sigma: f64,
    pub strength: u32,
}

impl Strategy {
    pub const fn new(noise_sigma: f64, strength: u32) -> Self {
        Self { noise_sigma, strength }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "noise={} strength={}", self.noise_sigma, self.strength)
    }
}

/// How provenance ended up being carried.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedMode {
    /// A strategy survived self-verification.
    DeepEmbed { strategy: Strategy, attempts: usize },
    /// Every strategy failed; pixels are clean and only metadata is attached.
    MetadataOnly { attempts: usize },
}

/// Result of an adaptive embed.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    /// PNG bytes with the envelope attached.
    pub image: Vec<u8>,
    pub envelope: SignedEnvelope,
    pub mode: EmbedMode,
    pub width: u32,
    pub height: u32,
}

impl EmbedOutcome {
    pub fn deep_embedded(&self) -> bool {
        matches!(self.mode, EmbedMode::DeepEmbed { .. })
    }
}

/// Embeds a watermark strong enough to survive, and no stronger.
pub struct AdaptiveEmbedder<'a> {
    key_store: &'a dyn KeyStore,
    pool: CandidatePool,
    transform: &'a dyn WatermarkTransform,
    config: &'a ProvenanceConfig,
    channel: MetadataChannel,
}

impl<'a> AdaptiveEmbedder<'a> {
    /// Self-verification scans against the signer plus `trust_store`.
    pub fn new(
        key_store: &'a dyn KeyStore,
        trust_store: &dyn TrustStore,
        transform: &'a dyn WatermarkTransform,
        config: &'a ProvenanceConfig,
    ) -> Self {
        Self {
            key_store,
            pool: CandidatePool::new(key_store.candidate(), trust_store),
            transform,
            config,
            channel: MetadataChannel::new(config.metadata_tag.clone()),
        }
    }

    /// Strategies for `image`, in the order they are tried.
    pub fn strategies(&self, image: &RgbImage) -> Vec<Strategy> {
        let mut ladder = vec![Strategy::new(0.0, 36), Strategy::new(0.0, 60)];

        if is_safe_for_noise(image, &self.config.texture) {
            ladder.push(Strategy::new(2.0, 50));
            let flat = image_stats(image)
                .is_some_and(|s| s.average_std_dev() < self.config.flat_image_std_dev);
            if flat {
                ladder.push(Strategy::new(4.0, 90));
            }
        } else {
            debug!("Dark flat regions detected, noise strategies disabled");
        }
        ladder
    }

    /// Embed into encoded image bytes.
    pub fn embed(&self, data: &[u8]) -> Result<EmbedOutcome> {
        let image =
            image::load_from_memory(data).map_err(|e| TesseraError::ImageRead(e.to_string()))?;
        self.embed_image(&image)
    }

    /// Embed into a decoded image.
    pub fn embed_image(&self, image: &DynamicImage) -> Result<EmbedOutcome> {
        let base = crop_to_even(&image.to_rgb8());
        let (width, height) = base.dimensions();
        if width == 0 || height == 0 {
            return Err(TesseraError::ImageRead(format!(
                "image too small: {}x{}",
                image.width(),
                image.height()
            )));
        }

        let payload =
            WatermarkPayload::new(&self.key_store.public_key_bytes(), chrono::Utc::now())
                .to_bytes();
        let mut rng = match self.config.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let strategies = self.strategies(&base);
        let mut chosen = None;
        for (i, strategy) in strategies.iter().enumerate() {
            debug!(attempt = i + 1, %strategy, "Trying strategy");
            match self.try_strategy(&base, &payload, strategy, &mut rng) {
                Some(marked) => {
                    chosen = Some((marked, *strategy, i + 1));
                    break;
                }
                None => debug!(%strategy, "Strategy did not survive JPEG pass"),
            }
        }

        let (pixels, mode) = match chosen {
            Some((marked, strategy, attempts)) => {
                info!(%strategy, attempts, "Deep embed verified");
                (marked, EmbedMode::DeepEmbed { strategy, attempts })
            }
            None => {
                warn!(
                    attempts = strategies.len(),
                    "No strategy survived, falling back to metadata only"
                );
                (
                    base,
                    EmbedMode::MetadataOnly {
                        attempts: strategies.len(),
                    },
                )
            }
        };

        let pixels = DynamicImage::ImageRgb8(pixels);
        let envelope = SignedEnvelope::for_image(&pixels, self.key_store)?;
        let image = self.channel.store_png(&envelope, &pixels)?;

        Ok(EmbedOutcome {
            image,
            envelope,
            mode,
            width,
            height,
        })
    }

    fn try_strategy(
        &self,
        base: &RgbImage,
        payload: &[u8],
        strategy: &Strategy,
        rng: &mut dyn RngCore,
    ) -> Option<RgbImage> {
        let noisy = add_gaussian_noise(base, strategy.noise_sigma, rng);
        let marked = match self.transform.embed(&noisy, payload, strategy.strength) {
            Ok(marked) => marked,
            Err(e) => {
                debug!(error = %e, "Embed failed");
                return None;
            }
        };

        self.survives_lossy_pass(&marked).then_some(marked)
    }

    /// Whether `candidate` still scans as the signer after JPEG compression.
    fn survives_lossy_pass(&self, candidate: &RgbImage) -> bool {
        let decoded = match jpeg_round_trip(candidate, self.config.verify_jpeg_quality) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "Self-verify pass failed");
                return false;
            }
        };

        let scanner =
            WatermarkScanner::new(self.transform, &self.pool, self.config.match_tolerance_bits);
        let own = fingerprint(&self.key_store.public_key_bytes());
        match scanner.scan(&decoded) {
            ScanOutcome::Identified { fingerprint, .. } => fingerprint == own,
            _ => false,
        }
    }
}

fn jpeg_round_trip(image: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
        .map_err(|e| TesseraError::Encode(e.to_string()))?;

    let decoded = image::load_from_memory_with_format(&buf, ImageFormat::Jpeg)
        .map_err(|e| TesseraError::ImageRead(e.to_string()))?;
    Ok(decoded.to_rgb8())
}
