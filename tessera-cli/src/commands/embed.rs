//! Deep-embed command implementations (single file and batch).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tessera_core::{
    AdaptiveEmbedder, ContactBook, DwtDctTransform, EmbedMode, EmbedOutcome, LocalIdentity,
    ProvenanceConfig,
};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::store::DataDir;
use crate::utils::{collect_images, marked_path, MARKED_DIR};

/// Shared, read-only state for embedding jobs.
struct EmbedContext {
    identity: LocalIdentity,
    contacts: ContactBook,
    config: ProvenanceConfig,
}

impl EmbedContext {
    fn load(store: &DataDir) -> Result<Self> {
        Ok(Self {
            identity: store.load_identity()?,
            contacts: store.load_contacts()?,
            config: ProvenanceConfig::from_env(),
        })
    }

    /// Embed one file and write the marked PNG. Blocking.
    fn embed_file(&self, file: &Path) -> Result<(PathBuf, EmbedOutcome)> {
        let content = std::fs::read(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?;

        let embedder =
            AdaptiveEmbedder::new(&self.identity, &self.contacts, &DwtDctTransform, &self.config);
        let outcome = embedder.embed(&content)?;

        let output = marked_path(file)?;
        if let Some(dir) = output.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to write directory: {}", dir.display()))?;
        }
        std::fs::write(&output, &outcome.image)
            .with_context(|| format!("Failed to write marked image: {}", output.display()))?;
        info!(path = %output.display(), mode = ?outcome.mode, "Marked image saved");

        Ok((output, outcome))
    }
}

fn describe(output: &Path, outcome: &EmbedOutcome) -> String {
    let name = output.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    match outcome.mode {
        EmbedMode::DeepEmbed { .. } => {
            format!("Saved to: {MARKED_DIR}/{name} (Deep Embed Active)")
        }
        EmbedMode::MetadataOnly { .. } => format!(
            "Image too fragile for Deep Embed. Applied Standard Signature to {MARKED_DIR}/{name}"
        ),
    }
}

/// Execute the deep-embed command.
pub async fn execute(store: &DataDir, file: PathBuf, quiet: bool) -> Result<()> {
    let context = Arc::new(EmbedContext::load(store)?);

    let (output, outcome) = tokio::task::spawn_blocking(move || context.embed_file(&file))
        .await
        .context("Embed task panicked")??;

    if !quiet {
        println!();
        match outcome.mode {
            EmbedMode::DeepEmbed { strategy, attempts } => {
                println!("{}", describe(&output, &outcome).green().bold());
                println!("{}", "This file contains a permanent Tessera mark.".cyan());
                println!();
                println!("   {} {}", "Strategy:".dimmed(), strategy);
                println!("   {} {}", "Attempts:".dimmed(), attempts);
            }
            EmbedMode::MetadataOnly { attempts } => {
                println!("{}", describe(&output, &outcome).yellow());
                println!();
                println!("   {} {}", "Attempts:".dimmed(), attempts);
            }
        }
        println!("   {} {}x{}", "Size:".dimmed(), outcome.width, outcome.height);
    }
    Ok(())
}

/// Execute the batch-embed command: every JPEG/PNG in `dir`, in parallel.
pub async fn execute_batch(store: &DataDir, dir: PathBuf, quiet: bool) -> Result<()> {
    let files = collect_images(&dir)?;
    let context = Arc::new(EmbedContext::load(store)?);

    if !quiet {
        let found = format!("Found {} images. Starting batch deep embed...", files.len());
        println!("{}", found.cyan());
        println!("{}", "-".repeat(40).dimmed());
    }

    let mut jobs = JoinSet::new();
    for file in files.iter().cloned() {
        let context = Arc::clone(&context);
        jobs.spawn_blocking(move || {
            let result = context.embed_file(&file);
            (file, result)
        });
    }

    let mut processed = 0usize;
    while let Some(joined) = jobs.join_next().await {
        let (file, result) = joined.context("Embed task panicked")?;
        match result {
            Ok((output, outcome)) => {
                processed += 1;
                if !quiet {
                    println!("{}", describe(&output, &outcome).green());
                }
            }
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Batch item failed");
                if !quiet {
                    let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    println!("{}", format!("{name}: {e:#}").red());
                }
            }
        }
    }

    if !quiet {
        println!("{}", "-".repeat(40).dimmed());
        println!("{}", format!("Processed {}/{} images.", processed, files.len()).cyan());
    }
    Ok(())
}
