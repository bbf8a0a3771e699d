//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::{ColoredString, Colorize};
use tessera_core::{
    CandidatePool, DwtDctTransform, KeyStore, ProvenanceConfig, ScanOutcome, TrustStatus,
    VerificationReport, Verifier,
};
use tracing::{debug, error, info};

use crate::store::DataDir;

fn banner(status: TrustStatus) -> ColoredString {
    let text = format!("{:^40}", status.to_string());
    match status {
        TrustStatus::Trusted => text.green().bold(),
        TrustStatus::UnknownAuthor | TrustStatus::NoSig => text.yellow().bold(),
        TrustStatus::Tampered | TrustStatus::Invalid => text.red().bold(),
    }
}

fn print_report(report: &VerificationReport) {
    println!();
    println!("{}", banner(report.status));
    println!();
    for line in report.message.lines() {
        println!("   {}", line);
    }

    match report.status {
        TrustStatus::Trusted | TrustStatus::UnknownAuthor => {
            println!("   {} {}", "Timestamp:".dimmed(), report.timestamp);
            if let Some(ScanOutcome::Identified { distance, .. }) = &report.watermark {
                println!("   {} {} bit(s)", "Mark distance:".dimmed(), distance);
            }
        }
        _ => {}
    }

    if report.status == TrustStatus::UnknownAuthor {
        println!();
        println!(
            "{}",
            "   (To trust this person, ask for their invite code and run 'add-contact')".dimmed()
        );
    }
}

/// Execute the verify command.
pub async fn execute(store: &DataDir, file: PathBuf, quiet: bool) -> Result<()> {
    let content = std::fs::read(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = content.len(), "Read file");

    // Verification works without an identity; contacts alone can be trusted.
    let contacts = store.load_contacts()?;
    let pool = match store.try_load_identity()? {
        Some(identity) => CandidatePool::new(identity.candidate(), &contacts),
        None => {
            debug!("No identity set up, verifying against contacts only");
            CandidatePool::from_contacts(&contacts)
        }
    };

    let config = ProvenanceConfig::from_env();
    let report = Verifier::new(&pool, &DwtDctTransform, &config).verify(&content);
    info!(status = %report.status, timestamp = %report.timestamp, "Verification complete");

    if !quiet {
        print_report(&report);
    }

    match report.status {
        TrustStatus::Tampered | TrustStatus::Invalid => {
            error!(status = %report.status, "Image failed verification");
            bail!("Verification failed: {}", report.status)
        }
        _ => Ok(()),
    }
}
