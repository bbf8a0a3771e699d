//! Rotate command implementation.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use tessera_core::{KeyStore, LocalIdentity};
use tracing::info;

use crate::store::DataDir;

/// Contact name under which a retired key is kept.
pub fn archive_name(display_name: &str, date: &str) -> String {
    format!("{display_name} (Old {date})")
}

fn confirmed() -> Result<bool> {
    print!("Type 'CONFIRM' to proceed: ");
    std::io::stdout().flush().context("Failed to write prompt")?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim() == "CONFIRM")
}

/// Execute the rotate command.
///
/// The old public key stays trusted as a contact so earlier images still
/// verify, and the old key files are copied to `archive_keys/`.
pub async fn execute(store: &DataDir, yes: bool, quiet: bool) -> Result<()> {
    let current = store.load_identity()?;

    if !yes {
        println!("{}", "WARNING: This will change your identity key.".red());
        println!("Your old key will be kept in your contacts so you can still verify old images.");
        println!("You must share your NEW invite code with your contacts.");
        if !confirmed()? {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    let now = Local::now();
    let old_name = archive_name(current.display_name(), &now.format("%Y-%m-%d").to_string());

    let mut contacts = store.load_contacts()?;
    contacts.add(old_name.clone(), &current.public_key_base64())?;
    store.save_contacts(&contacts)?;
    let archived = store.archive_identity(&current, &now.format("%Y-%m-%d_%H%M%S").to_string())?;

    let next = LocalIdentity::generate(current.display_name());
    store.save_identity(&next)?;
    info!(old = %current.fingerprint(), new = %next.fingerprint(), "Identity rotated");

    if !quiet {
        println!("{}", format!("Identity rotated. Old key saved as '{old_name}'.").green());
        println!("   {} {}", "Archive:".dimmed(), archived.display());
        println!("   {} {}", "New fingerprint:".dimmed(), next.fingerprint());
    }
    Ok(())
}
