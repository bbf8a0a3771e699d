//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

/// Output folder for metadata-signed copies.
pub const TAGGED_DIR: &str = "Tessera_Tagged";

/// Output folder for deep-embedded copies.
pub const MARKED_DIR: &str = "Tessera_Marked";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Build the output path for a signed copy.
///
/// Transforms `dir/photo.jpg` into `dir/Tessera_Tagged/photo.jpg`.
pub fn tagged_path(file: &Path) -> Result<PathBuf> {
    let name = file.file_name().context("Input path has no file name")?;
    Ok(parent_dir(file).join(TAGGED_DIR).join(name))
}

/// Build the output path for a deep-embedded copy (always PNG).
///
/// Transforms `dir/photo.jpg` into `dir/Tessera_Marked/photo.png`.
pub fn marked_path(file: &Path) -> Result<PathBuf> {
    let stem = file.file_stem().context("Input path has no file name")?;
    let mut name = stem.to_os_string();
    name.push(".png");
    Ok(parent_dir(file).join(MARKED_DIR).join(name))
}

fn parent_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Whether a path has a JPEG or PNG extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List the supported images directly inside `dir`, sorted by name.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Shareable identity card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub v: u32,
    pub name: String,
    pub key: String,
}

impl Invite {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            v: 1,
            name: name.into(),
            key: key.into(),
        }
    }

    /// Base64 of the invite JSON.
    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    /// Parse either a base64 invite code or raw invite JSON (optionally quoted).
    pub fn decode(code: &str) -> Result<Self> {
        let code = code.trim();
        let json = if code.starts_with('{') || code.starts_with('\'') {
            code.trim_matches(|c| c == '\'' || c == '"').to_string()
        } else {
            let bytes = STANDARD.decode(code).context("Invalid invite code format")?;
            String::from_utf8(bytes).context("Invalid invite code format")?
        };
        serde_json::from_str(&json).context("Invalid invite code format")
    }
}

/// Render `data` as a QR code of half-height unicode blocks, light on dark.
pub fn render_qr(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes()).context("Invite code too long for a QR code")?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build())
}

/// First 16 hex digits of a fingerprint, for display.
pub fn short_fingerprint(fingerprint: &str) -> String {
    format!("{}...", &fingerprint[..fingerprint.len().min(16)])
}
