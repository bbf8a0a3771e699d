//! Sign command implementation (metadata channel only).

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tessera_core::{sign_image, MetadataChannel, ProvenanceConfig};
use tracing::info;

use crate::store::DataDir;
use crate::utils::{tagged_path, TAGGED_DIR};

/// Execute the sign command.
pub async fn execute(store: &DataDir, file: PathBuf, quiet: bool) -> Result<()> {
    let identity = store.load_identity()?;
    let config = ProvenanceConfig::from_env();

    let content = std::fs::read(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = content.len(), "Read file");

    let channel = MetadataChannel::new(config.metadata_tag);
    let signed = sign_image(&content, &identity, &channel)?;

    let output = tagged_path(&file)?;
    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to write directory: {}", dir.display()))?;
    }
    std::fs::write(&output, &signed.data)
        .with_context(|| format!("Failed to write signed image: {}", output.display()))?;
    info!(path = %output.display(), "Signed image saved");

    if !quiet {
        let name = output.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!();
        println!("{}", "Image signed.".green().bold());
        println!();
        println!("   {} {}/{}", "Saved to:".dimmed(), TAGGED_DIR, name);
        println!("   {} {}", "Pixel hash:".dimmed(), &signed.envelope.payload.pixel_hash[..16]);
        println!("   {} {}", "Timestamp:".dimmed(), signed.envelope.payload.timestamp);
    }
    Ok(())
}
