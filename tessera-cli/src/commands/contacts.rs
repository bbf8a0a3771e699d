//! Identity sharing and contact management commands.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tessera_core::KeyStore;
use tracing::info;

use crate::store::DataDir;
use crate::utils::{render_qr, short_fingerprint, Invite};

/// Execute the me command: print the invite code for this identity.
pub async fn execute_me(store: &DataDir, quiet: bool) -> Result<()> {
    let identity = store.load_identity()?;
    let code = Invite::new(identity.display_name(), identity.public_key_base64()).encode()?;

    if quiet {
        println!("{code}");
        return Ok(());
    }

    println!();
    println!("{}", "Your Tessera Invite Code:".cyan());
    println!("{}", "-".repeat(60).dimmed());
    println!("   {} {}", "Name:".dimmed(), identity.display_name());
    println!("   {} {}", "Fingerprint:".dimmed(), identity.fingerprint());
    println!("{}", "-".repeat(60).dimmed());
    println!("{}", render_qr(&code)?);
    println!("{}", "-".repeat(60).dimmed());
    println!("Share this code (no quotes needed):");
    println!("{}", code.yellow());
    println!("{}", "-".repeat(60).dimmed());
    Ok(())
}

/// Execute the contacts command: list trusted contacts.
pub async fn execute_list(store: &DataDir, quiet: bool) -> Result<()> {
    let contacts = store.load_contacts()?;
    if quiet {
        return Ok(());
    }

    if contacts.is_empty() {
        println!("{}", "Your contact list is empty.".yellow());
        return Ok(());
    }

    println!();
    println!("{}", "Trusted Contacts:".cyan());
    println!("{}", "-".repeat(60).dimmed());
    println!("{:<24} | {}", "NAME", "FINGERPRINT (ID)");
    println!("{}", "-".repeat(60).dimmed());
    for (fingerprint, contact) in contacts.iter() {
        let id = format!("| {}", short_fingerprint(fingerprint));
        println!("{:<24} {}", contact.name.green(), id.dimmed());
    }
    println!("{}", "-".repeat(60).dimmed());
    Ok(())
}

/// Execute the add-contact command.
///
/// Accepts either `NAME KEY` or a single invite code.
pub async fn execute_add(
    store: &DataDir,
    data: String,
    key: Option<String>,
    quiet: bool,
) -> Result<()> {
    let (name, key) = match key {
        Some(key) => (data, key),
        None => {
            let invite = Invite::decode(&data)?;
            if !quiet {
                println!("{}", format!("Detected invite code for '{}'...", invite.name).cyan());
            }
            (invite.name, invite.key)
        }
    };

    if name.trim().is_empty() {
        bail!("Could not extract a contact name");
    }

    let mut contacts = store.load_contacts()?;
    let fingerprint = contacts.add(name.clone(), &key).context("Invalid key format")?;
    store.save_contacts(&contacts)?;
    info!(%fingerprint, "Contact added");

    if !quiet {
        println!("{}", format!("Added {name} to trusted contacts.").green());
    }
    Ok(())
}
