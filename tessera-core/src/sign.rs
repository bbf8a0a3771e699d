//! Metadata-only signing.
//!
//! Attaches a signed envelope without touching pixels. JPEGs keep their
//! compressed data byte for byte; PNGs are re-encoded losslessly.

use tracing::info;

use crate::attestation::SignedEnvelope;
use crate::container::{ContainerFormat, MetadataChannel};
use crate::error::{Result, TesseraError};
use crate::keys::KeyStore;

/// A signed image ready to write out.
#[derive(Debug, Clone)]
pub struct SignedImage {
    pub data: Vec<u8>,
    pub format: ContainerFormat,
    pub envelope: SignedEnvelope,
}

/// Sign the pixels of an encoded JPEG or PNG.
pub fn sign_image(
    data: &[u8],
    key_store: &dyn KeyStore,
    channel: &MetadataChannel,
) -> Result<SignedImage> {
    let format = ContainerFormat::detect(data)?;
    let image =
        image::load_from_memory(data).map_err(|e| TesseraError::ImageRead(e.to_string()))?;

    let envelope = SignedEnvelope::for_image(&image, key_store)?;
    let data = channel.store(&envelope, data)?;
    info!(?format, author = %envelope.payload.author, "Image signed");

    Ok(SignedImage { data, format, envelope })
}
