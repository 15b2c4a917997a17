//! OCTP - signed trust envelopes for code contributions
//!
//! Entry point for the `octp` binary: `sign`, `verify` and `keys`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use octp_core::config::OctpConfig;
use octp_core::integrity::KeyManager;

mod display;
mod sign_cli;
mod verify_cli;

/// Library areas that can be traced individually
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TraceModule {
    Checks,
    Integrity,
    Envelope,
    Git,
    All,
}

impl TraceModule {
    fn target(self) -> &'static str {
        match self {
            TraceModule::Checks => "octp_core::checks",
            TraceModule::Integrity => "octp_core::integrity",
            TraceModule::Envelope => "octp_core::envelope",
            TraceModule::Git => "octp_core::git",
            TraceModule::All => "octp_core",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "octp",
    about = "Issue and verify signed trust envelopes for code contributions",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable structured JSON tracing (comma-separated: checks,integrity,envelope,git,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Log level: off, error, warn, info, debug or trace
    #[clap(long, default_value = "info", global = true)]
    log_level: LevelFilter,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run checks on the current commit and write a signed envelope
    Sign(sign_cli::SignArgs),

    /// Verify a persisted envelope
    Verify(verify_cli::VerifyArgs),

    /// Show (and create if needed) the developer signing keys
    Keys {
        /// Key directory (default: $OCTP_KEYS_DIR, config, then ~/.octp/keys)
        #[clap(long)]
        keys_dir: Option<PathBuf>,
    },
}

/// Logs go to stderr so stdout stays parseable (`verify --json`). Any
/// `--trace` module switches to JSON lines and lifts that module to TRACE.
fn initialize_tracing(log_level: LevelFilter, trace: &[TraceModule]) {
    let targets = trace.iter().fold(
        Targets::new().with_default(log_level),
        |targets, module| targets.with_target(module.target(), LevelFilter::TRACE),
    );
    let registry = tracing_subscriber::registry().with(targets);
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if trace.is_empty() {
        registry.with(layer.with_target(false)).init();
    } else {
        registry
            .with(layer.json().with_file(true).with_line_number(true))
            .init();
        tracing::debug!(?trace, "JSON tracing enabled");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(cli.log_level, &cli.trace);

    match cli.command {
        Command::Sign(args) => args.execute().await,
        Command::Verify(args) => args.execute(),
        Command::Keys { keys_dir } => show_keys(keys_dir),
    }
}

fn show_keys(keys_dir: Option<PathBuf>) -> Result<()> {
    let config = OctpConfig::load(Path::new(".")).context("Failed to load configuration")?;
    let keys = KeyManager::new(config.resolve_keys_dir(keys_dir));

    let existed = keys.has_keypair();
    let public_key = keys
        .public_key_pem()
        .with_context(|| format!("Failed to prepare keys in {}", keys.keys_dir().display()))?;

    if !existed {
        println!("Generated a new signing keypair.");
    }
    println!("Private key: {}", keys.private_key_path().display());
    println!("Public key:  {}", keys.public_key_path().display());
    println!();
    print!("{public_key}");

    Ok(())
}
