//! Example showing the adaptive embedder's tracing output.
//!
//! Run with: cargo run -p tessera-core --example deep_embed_tracing

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tessera_core::{
    AdaptiveEmbedder, CandidatePool, ContactBook, DwtDctTransform, EmbedMode, KeyStore,
    LocalIdentity, ProvenanceConfig, Verifier,
};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("tessera_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Deep Embed Tracing Demo ===\n");

    let identity = LocalIdentity::generate("Demo");
    let contacts = ContactBook::new();
    let config = ProvenanceConfig::from_env();
    println!("Config: {:?}\n", config);

    // A dark, flat image disables the noise strategies.
    for (label, pixel) in [("mid grey", [128u8, 128, 128]), ("near black", [12, 12, 14])] {
        let source = RgbImage::from_pixel(320, 240, Rgb(pixel));
        let mut buf = Cursor::new(Vec::new());
        if let Err(e) = DynamicImage::ImageRgb8(source).write_to(&mut buf, ImageFormat::Png) {
            eprintln!("Failed to encode source: {}", e);
            return;
        }

        println!("\nEmbedding into {label} image...\n");
        let embedder = AdaptiveEmbedder::new(&identity, &contacts, &DwtDctTransform, &config);
        let outcome = match embedder.embed(buf.get_ref()) {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("\n❌ Failed: {}", e);
                continue;
            }
        };

        match outcome.mode {
            EmbedMode::DeepEmbed { strategy, attempts } => {
                println!("\n✅ Deep embed after {attempts} attempt(s): {strategy}");
            }
            EmbedMode::MetadataOnly { attempts } => {
                println!("\n⚠️  Metadata only after {attempts} attempt(s)");
            }
        }

        let pool = CandidatePool::new(identity.candidate(), &contacts);
        let report = Verifier::new(&pool, &DwtDctTransform, &config).verify(&outcome.image);
        println!("   Status: {}", report.status);
        println!("   {}", report.message.replace('\n', "\n   "));
    }
}
