//! PNG text-chunk codec.

use std::io::Cursor;

use image::DynamicImage;
use png::{BitDepth, ColorType, Decoder, Encoder};

use crate::error::{Result, TesseraError};

/// Losslessly encode `image` as an 8-bit PNG carrying `text` under `tag`.
///
/// Alpha is kept when present. ASCII text is written as `tEXt`, anything else
/// as `iTXt`.
pub fn encode_with_text(image: &DynamicImage, tag: &str, text: &str) -> Result<Vec<u8>> {
    let (color, raw) = if image.color().has_alpha() {
        (ColorType::Rgba, image.to_rgba8().into_raw())
    } else {
        (ColorType::Rgb, image.to_rgb8().into_raw())
    };

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(color);
        encoder.set_depth(BitDepth::Eight);

        let added = if text.is_ascii() {
            encoder.add_text_chunk(tag.to_string(), text.to_string())
        } else {
            encoder.add_itxt_chunk(tag.to_string(), text.to_string())
        };
        added.map_err(|e| TesseraError::Encode(e.to_string()))?;

        let mut writer = encoder
            .write_header()
            .map_err(|e| TesseraError::Encode(e.to_string()))?;
        writer
            .write_image_data(&raw)
            .map_err(|e| TesseraError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| TesseraError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Re-encode a PNG stream with `text` stored under `tag`.
pub fn write_ancillary_text(data: &[u8], tag: &str, text: &str) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| TesseraError::ImageRead(format!("Failed to decode PNG: {e}")))?;
    encode_with_text(&image, tag, text)
}

/// Read the text stored under `tag` from any `tEXt`, `zTXt` or `iTXt` chunk
/// preceding the image data.
pub fn read_ancillary_text(data: &[u8], tag: &str) -> Option<String> {
    let reader = Decoder::new(Cursor::new(data)).read_info().ok()?;
    let info = reader.info();

    if let Some(chunk) = info.uncompressed_latin1_text.iter().find(|c| c.keyword == tag) {
        return Some(chunk.text.clone());
    }
    if let Some(chunk) = info.compressed_latin1_text.iter().find(|c| c.keyword == tag) {
        return chunk.get_text().ok();
    }
    info.utf8_text
        .iter()
        .find(|c| c.keyword == tag)
        .and_then(|c| c.get_text().ok())
}
