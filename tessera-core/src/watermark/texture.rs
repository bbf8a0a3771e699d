//! Texture statistics used to pick embedding strategies.
//!
//! Gaussian noise helps a watermark survive on smooth images, but on dark,
//! flat regions it shows up as visible grain and banding. The image is split
//! into a grid of sectors; too many dark flat sectors disable noise.

use image::RgbImage;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::TextureThresholds;

/// Per-channel mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: [f64; 3],
    pub std_dev: [f64; 3],
}

impl ChannelStats {
    /// Mean of the three channel standard deviations.
    pub fn average_std_dev(&self) -> f64 {
        self.std_dev.iter().sum::<f64>() / 3.0
    }
}

/// Statistics over the `width x height` region starting at `(x0, y0)`.
///
/// Returns `None` for an empty region.
pub fn region_stats(
    image: &RgbImage,
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
) -> Option<ChannelStats> {
    let count = width as f64 * height as f64;
    if count == 0.0 {
        return None;
    }

    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            for (c, &v) in image.get_pixel(x, y).0.iter().enumerate() {
                let v = v as f64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }
    }

    let mean = sum.map(|s| s / count);
    let mut std_dev = [0f64; 3];
    for c in 0..3 {
        std_dev[c] = (sum_sq[c] / count - mean[c] * mean[c]).max(0.0).sqrt();
    }
    Some(ChannelStats { mean, std_dev })
}

/// Statistics over the whole image.
pub fn image_stats(image: &RgbImage) -> Option<ChannelStats> {
    region_stats(image, 0, 0, image.width(), image.height())
}

/// Mean 8-bit luma (`0.299 R + 0.587 G + 0.114 B`, rounded per pixel).
fn region_brightness(image: &RgbImage, x0: u32, y0: u32, width: u32, height: u32) -> f64 {
    let mut sum = 0f64;
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            let [r, g, b] = image.get_pixel(x, y).0.map(f64::from);
            sum += (0.299 * r + 0.587 * g + 0.114 * b).round();
        }
    }
    sum / (width as f64 * height as f64)
}

/// Whether noise can be added without visible banding.
pub fn is_safe_for_noise(image: &RgbImage, thresholds: &TextureThresholds) -> bool {
    let grid = thresholds.grid.max(1);
    let step_x = image.width() / grid;
    let step_y = image.height() / grid;
    if step_x == 0 || step_y == 0 {
        return true;
    }

    let mut risky = 0u32;
    for gy in 0..grid {
        for gx in 0..grid {
            let (x0, y0) = (gx * step_x, gy * step_y);
            let Some(stats) = region_stats(image, x0, y0, step_x, step_y) else {
                continue;
            };
            let brightness = region_brightness(image, x0, y0, step_x, step_y);
            let flat = stats.average_std_dev() < thresholds.flat_std_dev;
            if brightness < thresholds.dark_brightness && flat {
                risky += 1;
            }
        }
    }

    let fraction = risky as f64 / (grid * grid) as f64;
    tracing::trace!(risky, fraction, "Texture analysis");
    fraction <= thresholds.max_risky_fraction
}

/// Add one zero-mean gaussian sample per pixel, identically to all three
/// channels, then clamp and truncate.
pub fn add_gaussian_noise<R: Rng + ?Sized>(image: &RgbImage, sigma: f64, rng: &mut R) -> RgbImage {
    let mut out = image.clone();
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) if sigma > 0.0 => normal,
        _ => return out,
    };

    for pixel in out.pixels_mut() {
        let n = normal.sample(rng);
        for v in pixel.0.iter_mut() {
            *v = (*v as f64 + n).clamp(0.0, 255.0) as u8;
        }
    }
    out
}
