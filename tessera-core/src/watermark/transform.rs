//! DWT-DCT watermark transform.
//!
//! Bits live in the blue-difference chroma plane (Cb), which the eye is least
//! sensitive to. The plane goes through one level of a Haar wavelet; the
//! low-frequency (LL) band is cut into 4x4 blocks and each block's (1,1) DCT
//! coefficient is pushed to at least `+strength` for a `1` bit or at most
//! `-strength` for a `0` bit. Payload bits repeat across all blocks, and
//! decoding takes a per-bit sign vote, so a single block surviving is not
//! required.
//!
//! Luma and the red-difference plane are left unchanged: only green and blue
//! move, in the exact ratio that changes Cb alone.

use image::{imageops, RgbImage};
use thiserror::Error;

const BLOCK: usize = 4;

// Coefficients closer to zero than this cast no vote (flat blocks).
const DEAD_ZONE: f32 = 1e-3;

// Full-range BT.601 Cb weights.
const CB_R: f32 = -0.168_736;
const CB_G: f32 = -0.331_264;
const CB_B: f32 = 0.5;

// RGB change per unit of Cb change with Y and Cr held fixed.
const DG_PER_CB: f32 = -0.344_136;
const DB_PER_CB: f32 = 1.772;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("image dimensions must be even, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },

    #[error("image holds {available} watermark blocks, payload needs {needed}")]
    InsufficientCapacity { needed: usize, available: usize },

    #[error("watermark payload is empty")]
    EmptyPayload,
}

/// Embeds and recovers a byte payload in pixel data.
///
/// Implementations must be deterministic: the same input always produces the
/// same output.
pub trait WatermarkTransform: Send + Sync {
    /// Return a copy of `image` carrying `payload` at the given strength.
    fn embed(
        &self,
        image: &RgbImage,
        payload: &[u8],
        strength: u32,
    ) -> Result<RgbImage, TransformError>;

    /// Recover `byte_len` payload bytes. Always returns bytes when the image is
    /// large enough, watermarked or not.
    fn decode(&self, image: &RgbImage, byte_len: usize) -> Result<Vec<u8>, TransformError>;
}

/// One-level Haar DWT followed by a 4x4 block DCT on the Cb plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwtDctTransform;

/// Crop to the largest even width and height, anchored top-left.
pub fn crop_to_even(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let (ew, eh) = (w - w % 2, h - h % 2);
    if (ew, eh) == (w, h) {
        return image.clone();
    }
    imageops::crop_imm(image, 0, 0, ew, eh).to_image()
}

/// Number of payload bits a `width x height` image can hold once.
pub fn capacity_bits(width: u32, height: u32) -> usize {
    (width as usize / 2 / BLOCK) * (height as usize / 2 / BLOCK)
}

struct Layout {
    width: usize,
    band_width: usize,
    blocks_x: usize,
    blocks: usize,
}

impl Layout {
    fn new(image: &RgbImage, nbits: usize) -> Result<Self, TransformError> {
        let (width, height) = image.dimensions();
        if width % 2 != 0 || height % 2 != 0 {
            return Err(TransformError::OddDimensions { width, height });
        }
        if nbits == 0 {
            return Err(TransformError::EmptyPayload);
        }

        let blocks = capacity_bits(width, height);
        if blocks < nbits {
            return Err(TransformError::InsufficientCapacity {
                needed: nbits,
                available: blocks,
            });
        }

        let band_width = width as usize / 2;
        Ok(Self {
            width: width as usize,
            band_width,
            blocks_x: band_width / BLOCK,
            blocks,
        })
    }

    /// LL-band origin of block `k`.
    fn block_origin(&self, k: usize) -> (usize, usize) {
        ((k % self.blocks_x) * BLOCK, (k / self.blocks_x) * BLOCK)
    }
}

/// Orthonormal DCT-II basis function for coefficient (1,1), indexed `[y][x]`.
fn basis() -> [[f32; BLOCK]; BLOCK] {
    let scale = (2.0 / BLOCK as f32).sqrt();
    let mut row = [0f32; BLOCK];
    for (i, v) in row.iter_mut().enumerate() {
        *v = scale * ((2 * i + 1) as f32 * std::f32::consts::PI / (2 * BLOCK) as f32).cos();
    }

    let mut out = [[0f32; BLOCK]; BLOCK];
    for y in 0..BLOCK {
        for x in 0..BLOCK {
            out[y][x] = row[y] * row[x];
        }
    }
    out
}

fn chroma_plane(image: &RgbImage) -> Vec<f32> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0.map(f32::from);
            128.0 + CB_R * r + CB_G * g + CB_B * b
        })
        .collect()
}

/// Haar LL band (orthonormal: each 2x2 sum divided by 2).
fn low_band(plane: &[f32], layout: &Layout) -> Vec<f32> {
    let band_height = plane.len() / layout.width / 2;
    let mut band = vec![0f32; layout.band_width * band_height];
    for by in 0..band_height {
        for bx in 0..layout.band_width {
            let top = 2 * by * layout.width + 2 * bx;
            let bottom = top + layout.width;
            band[by * layout.band_width + bx] =
                (plane[top] + plane[top + 1] + plane[bottom] + plane[bottom + 1]) / 2.0;
        }
    }
    band
}

fn coefficient(band: &[f32], layout: &Layout, k: usize, basis: &[[f32; BLOCK]; BLOCK]) -> f32 {
    let (ox, oy) = layout.block_origin(k);
    let mut sum = 0.0;
    for y in 0..BLOCK {
        for x in 0..BLOCK {
            sum += band[(oy + y) * layout.band_width + ox + x] * basis[y][x];
        }
    }
    sum
}

fn payload_bits(payload: &[u8]) -> Vec<bool> {
    payload
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

impl WatermarkTransform for DwtDctTransform {
    fn embed(
        &self,
        image: &RgbImage,
        payload: &[u8],
        strength: u32,
    ) -> Result<RgbImage, TransformError> {
        let bits = payload_bits(payload);
        let layout = Layout::new(image, bits.len())?;
        let basis = basis();
        let band = low_band(&chroma_plane(image), &layout);
        let target = strength as f32;

        // Cb change per pixel.
        let mut shift = vec![0f32; image.as_raw().len() / 3];
        for k in 0..layout.blocks {
            let current = coefficient(&band, &layout, k, &basis);
            let wanted = if bits[k % bits.len()] {
                current.max(target)
            } else {
                current.min(-target)
            };
            let delta = wanted - current;
            if delta == 0.0 {
                continue;
            }

            let (ox, oy) = layout.block_origin(k);
            for y in 0..BLOCK {
                for x in 0..BLOCK {
                    // An LL change of d moves each of its 4 source pixels by d/2.
                    let d = delta * basis[y][x] / 2.0;
                    let px = 2 * (ox + x);
                    let py = 2 * (oy + y);
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        shift[(py + dy) * layout.width + px + dx] += d;
                    }
                }
            }
        }

        let mut out = image.clone();
        for (pixel, d) in out.pixels_mut().zip(shift) {
            if d == 0.0 {
                continue;
            }
            let [r, g, b] = pixel.0;
            pixel.0 = [
                r,
                (g as f32 + DG_PER_CB * d).round().clamp(0.0, 255.0) as u8,
                (b as f32 + DB_PER_CB * d).round().clamp(0.0, 255.0) as u8,
            ];
        }
        Ok(out)
    }

    fn decode(&self, image: &RgbImage, byte_len: usize) -> Result<Vec<u8>, TransformError> {
        let nbits = byte_len * 8;
        let layout = Layout::new(image, nbits)?;
        let basis = basis();
        let band = low_band(&chroma_plane(image), &layout);

        let mut votes = vec![0i64; nbits];
        for k in 0..layout.blocks {
            let c = coefficient(&band, &layout, k, &basis);
            if c > DEAD_ZONE {
                votes[k % nbits] += 1;
            } else if c < -DEAD_ZONE {
                votes[k % nbits] -= 1;
            }
        }

        Ok(votes
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &v| (acc << 1) | u8::from(v > 0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder, Rgb};

    const PAYLOAD: &[u8; 8] = b"a1b2c3d4";

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (100 + (x * 3 + y) % 20) as u8,
                (110 + (x + y * 2) % 20) as u8,
                (120 + (x * 5 + y * 3) % 20) as u8,
            ])
        })
    }

    fn jpeg_pass(image: &RgbImage, quality: u8) -> RgbImage {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
            .unwrap();
        image::load_from_memory(&buf).unwrap().to_rgb8()
    }

    #[test]
    fn test_lossless_roundtrip() {
        let image = textured(128, 96);
        let marked = DwtDctTransform.embed(&image, PAYLOAD, 36).unwrap();
        assert_eq!(DwtDctTransform.decode(&marked, 8).unwrap(), PAYLOAD);
    }

    #[test]
    fn test_survives_jpeg_95() {
        let image = RgbImage::from_pixel(128, 128, Rgb([128, 128, 128]));
        let marked = DwtDctTransform.embed(&image, PAYLOAD, 36).unwrap();
        let recovered = DwtDctTransform.decode(&jpeg_pass(&marked, 95), 8).unwrap();
        assert_eq!(recovered, PAYLOAD);
    }

    #[test]
    fn test_embed_is_deterministic() {
        let image = textured(64, 64);
        let a = DwtDctTransform.embed(&image, PAYLOAD, 50).unwrap();
        let b = DwtDctTransform.embed(&image, PAYLOAD, 50).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_luma_barely_moves() {
        let image = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        let marked = DwtDctTransform.embed(&image, PAYLOAD, 36).unwrap();
        for (a, b) in image.pixels().zip(marked.pixels()) {
            let luma =
                |p: &Rgb<u8>| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
            assert!((luma(a) - luma(b)).abs() < 1.0);
            assert_eq!(a[0], b[0]);
        }
    }

    #[test]
    fn test_flat_image_decodes_to_zeros() {
        let image = RgbImage::from_pixel(64, 64, Rgb([200, 10, 90]));
        assert_eq!(DwtDctTransform.decode(&image, 8).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        let image = RgbImage::new(65, 64);
        assert_eq!(
            DwtDctTransform.decode(&image, 8),
            Err(TransformError::OddDimensions { width: 65, height: 64 })
        );
    }

    #[test]
    fn test_rejects_small_images() {
        // 32x32 -> 16x16 LL band -> 16 blocks < 64 bits
        let image = RgbImage::new(32, 32);
        assert_eq!(
            DwtDctTransform.embed(&image, PAYLOAD, 36),
            Err(TransformError::InsufficientCapacity { needed: 64, available: 16 })
        );
    }

    #[test]
    fn test_rejects_empty_payload() {
        let image = RgbImage::new(64, 64);
        assert_eq!(DwtDctTransform.embed(&image, &[], 36), Err(TransformError::EmptyPayload));
    }

    #[test]
    fn test_crop_to_even() {
        let image = RgbImage::new(65, 33);
        assert_eq!(crop_to_even(&image).dimensions(), (64, 32));
        assert_eq!(crop_to_even(&RgbImage::new(4, 4)).dimensions(), (4, 4));
    }
}
