//! Tessera CLI - dual-channel image provenance tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod store;
mod utils;

use exit_codes::ExitCode;
use store::DataDir;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Verification failed (TAMPERED or INVALID)
  66  Cannot open input file
  74  Cannot write output file
  78  No identity set up (run 'tessera setup <NAME>')";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about = "Sign and verify image provenance", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorChoice,

    /// Data directory holding identity and contacts
    #[arg(long, env = "TESSERA_HOME", global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create your signing identity
    Setup {
        /// Your display name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Sign an image (metadata only, pixels unchanged)
    Sign {
        /// Path to a JPEG or PNG image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Embed an invisible, compression-resistant mark and sign the result
    DeepEmbed {
        /// Path to a JPEG or PNG image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Verify an image's provenance
    Verify {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show your invite code
    Me,

    /// List trusted contacts
    Contacts,

    /// Trust a contact, by name and key or by invite code
    AddContact {
        /// Contact name, or a full invite code
        #[arg(value_name = "NAME|INVITE")]
        data: String,

        /// Base64 public key (omit when passing an invite code)
        #[arg(value_name = "KEY")]
        key: Option<String>,
    },

    /// Generate a new identity key, keeping the old one as a contact
    Rotate {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Deep-embed every JPEG/PNG image in a folder
    BatchEmbed {
        /// Folder containing images
        #[arg(value_name = "DIR")]
        folder: PathBuf,
    },
}

fn init_tracing(verbose: bool, color: ColorChoice) {
    let filter = if verbose {
        EnvFilter::new("tessera_core=debug,tessera_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!matches!(color, ColorChoice::Never))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = DataDir::resolve(cli.home)?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Setup { name } => commands::setup::execute(&store, name, quiet).await,
        Commands::Sign { file } => commands::sign::execute(&store, file, quiet).await,
        Commands::DeepEmbed { file } => commands::embed::execute(&store, file, quiet).await,
        Commands::Verify { file } => commands::verify::execute(&store, file, quiet).await,
        Commands::Me => commands::contacts::execute_me(&store, quiet).await,
        Commands::Contacts => commands::contacts::execute_list(&store, quiet).await,
        Commands::AddContact { data, key } => {
            commands::contacts::execute_add(&store, data, key, quiet).await
        }
        Commands::Rotate { yes } => commands::rotate::execute(&store, yes, quiet).await,
        Commands::BatchEmbed { folder } => {
            commands::embed::execute_batch(&store, folder, quiet).await
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose, cli.color);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::ExitCode::from(exit.code as u8)
}
