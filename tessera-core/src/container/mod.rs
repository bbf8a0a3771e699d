//! Metadata channel.
//!
//! Stores a [`SignedEnvelope`] as JSON in the single ancillary text slot of
//! the image container and reads it back. Two containers are supported:
//!
//! - **JPEG** - a comment (COM) segment, injected without re-encoding
//! - **PNG** - a text chunk, written by a lossless re-encode
//!
//! Any other container is [`TesseraError::UnsupportedFormat`].

pub mod jpeg_com;
pub mod png_text;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::attestation::SignedEnvelope;
use crate::config::DEFAULT_METADATA_TAG;
use crate::error::{Result, TesseraError};

/// Containers with a metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Jpeg,
    Png,
}

impl ContainerFormat {
    /// Detect the container from magic bytes.
    ///
    /// Recognized non-JPEG/PNG images are `UnsupportedFormat`; data that is
    /// not an image at all is `ImageRead`.
    pub fn detect(data: &[u8]) -> Result<Self> {
        match image::guess_format(data) {
            Ok(ImageFormat::Jpeg) => Ok(Self::Jpeg),
            Ok(ImageFormat::Png) => Ok(Self::Png),
            Ok(other) => Err(TesseraError::UnsupportedFormat(format!("{other:?}"))),
            Err(e) => Err(TesseraError::ImageRead(e.to_string())),
        }
    }
}

/// Result of looking for an envelope in an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeLookup {
    Found(SignedEnvelope),
    /// No slot carries our tag.
    Missing,
    /// The slot exists but does not hold a valid envelope.
    Malformed(String),
}

impl EnvelopeLookup {
    pub fn found(self) -> Option<SignedEnvelope> {
        match self {
            Self::Found(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// Reads and writes envelopes under a fixed tag.
#[derive(Debug, Clone)]
pub struct MetadataChannel {
    tag: String,
}

impl Default for MetadataChannel {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TAG)
    }
}

impl MetadataChannel {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Write `envelope` into an encoded JPEG or PNG, keeping its container.
    pub fn store(&self, envelope: &SignedEnvelope, data: &[u8]) -> Result<Vec<u8>> {
        let json = envelope.to_json()?;
        let format = ContainerFormat::detect(data)?;
        debug!(?format, bytes = json.len(), "Storing envelope");

        match format {
            ContainerFormat::Jpeg => jpeg_com::write_ancillary_text(data, &self.tag, &json),
            ContainerFormat::Png => png_text::write_ancillary_text(data, &self.tag, &json),
        }
    }

    /// Encode `image` as PNG with `envelope` attached.
    pub fn store_png(&self, envelope: &SignedEnvelope, image: &DynamicImage) -> Result<Vec<u8>> {
        let json = envelope.to_json()?;
        png_text::encode_with_text(image, &self.tag, &json)
    }

    /// Look for an envelope. Never fails: unreadable input is `Missing`.
    pub fn load(&self, data: &[u8]) -> EnvelopeLookup {
        let raw = match ContainerFormat::detect(data) {
            Ok(ContainerFormat::Jpeg) => jpeg_com::read_ancillary_text(data, &self.tag),
            Ok(ContainerFormat::Png) => png_text::read_ancillary_text(data, &self.tag),
            Err(_) => None,
        };

        let Some(raw) = raw else {
            return EnvelopeLookup::Missing;
        };

        match SignedEnvelope::from_json(&raw) {
            Ok(envelope) => EnvelopeLookup::Found(envelope),
            Err(e) => {
                warn!(error = %e, "Metadata slot holds a malformed envelope");
                EnvelopeLookup::Malformed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationPayload;
    use crate::keys::LocalIdentity;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn envelope() -> SignedEnvelope {
        let identity = LocalIdentity::generate("Alice");
        SignedEnvelope::sign(AttestationPayload::new("00", "Alice"), &identity).unwrap()
    }

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([40, 80, 120])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_detect_formats() {
        let png = encoded(ImageFormat::Png);
        let jpeg = encoded(ImageFormat::Jpeg);
        assert_eq!(ContainerFormat::detect(&png).unwrap(), ContainerFormat::Png);
        assert_eq!(ContainerFormat::detect(&jpeg).unwrap(), ContainerFormat::Jpeg);
        assert!(matches!(
            ContainerFormat::detect(b"GIF89a......"),
            Err(TesseraError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ContainerFormat::detect(b"plain text"),
            Err(TesseraError::ImageRead(_))
        ));
    }

    #[test]
    fn test_store_load_png() {
        let channel = MetadataChannel::default();
        let env = envelope();
        let out = channel.store(&env, &encoded(ImageFormat::Png)).unwrap();
        assert_eq!(channel.load(&out), EnvelopeLookup::Found(env));
    }

    #[test]
    fn test_store_load_jpeg_keeps_pixels() {
        let channel = MetadataChannel::default();
        let env = envelope();
        let original = encoded(ImageFormat::Jpeg);
        let out = channel.store(&env, &original).unwrap();

        assert_eq!(channel.load(&out), EnvelopeLookup::Found(env));
        let before = image::load_from_memory(&original).unwrap().to_rgb8();
        let after = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_and_malformed() {
        let channel = MetadataChannel::default();
        assert_eq!(channel.load(&encoded(ImageFormat::Png)), EnvelopeLookup::Missing);
        assert_eq!(channel.load(b"garbage"), EnvelopeLookup::Missing);

        let img = image::load_from_memory(&encoded(ImageFormat::Png)).unwrap();
        let bad = png_text::encode_with_text(&img, channel.tag(), "{not json").unwrap();
        assert!(matches!(channel.load(&bad), EnvelopeLookup::Malformed(_)));
    }

    #[test]
    fn test_unsupported_store() {
        let channel = MetadataChannel::default();
        assert!(matches!(
            channel.store(&envelope(), b"BM\x00\x00"),
            Err(TesseraError::UnsupportedFormat(_))
        ));
    }
}
