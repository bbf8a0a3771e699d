//! Setup command implementation.

use anyhow::Result;
use colored::Colorize;
use tessera_core::LocalIdentity;
use tracing::info;

use crate::store::DataDir;

/// Execute the setup command.
pub async fn execute(store: &DataDir, name: String, quiet: bool) -> Result<()> {
    if store.is_setup() {
        let existing = store.load_identity()?;
        if !quiet {
            println!("{}", "You are already set up!".yellow());
            println!("   {} {}", "Fingerprint:".dimmed(), existing.fingerprint());
        }
        return Ok(());
    }

    let name = name.trim().to_string();
    if name.is_empty() {
        anyhow::bail!("Display name must not be empty");
    }

    let identity = LocalIdentity::generate(name.clone());
    store.save_identity(&identity)?;
    info!(fingerprint = %identity.fingerprint(), "Identity created");

    if !quiet {
        println!();
        println!("{}", format!("Identity created for '{name}'.").green().bold());
        println!();
        println!("   {} {}", "Fingerprint:".dimmed(), identity.fingerprint());
        println!("   {} {}", "Stored in:".dimmed(), store.root().display());
    }
    Ok(())
}
