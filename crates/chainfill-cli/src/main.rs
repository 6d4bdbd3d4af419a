//! # chainfill-cli
//!
//! Command-line front end for filling blockchain test fixtures.
//!
//! ## Usage
//!
//! ```bash
//! # Fill a test definition for one or more forks
//! chainfill fill transfer.json --fork Cancun --fork Shanghai
//! chainfill fill transfer.json --fork Cancun --eip 1153 --output out.json
//!
//! # Emit engine-API (hive) fixtures instead
//! chainfill fill transfer.json --fork Cancun --hive
//!
//! # List known forks
//! chainfill forks
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

/// Blockchain test fixture filler
#[derive(Parser, Debug)]
#[command(name = "chainfill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Config file (defaults to ~/.chainfill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Fill a test definition into fixtures
    Fill(commands::fill::FillArgs),
    /// List known forks
    Forks,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so fixtures written to stdout stay parseable
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    let result = run(cli).await;

    if let Err(e) = result {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": format!("{:#}", e),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    match cli.command {
        Commands::Fill(args) => {
            let source = args.test.display().to_string();
            commands::fill::execute(args, &config, cli.json)
                .await
                .with_context(|| format!("failed to fill {}", source))?
        }
        Commands::Forks => commands::forks::execute(cli.json)?,
        Commands::Config => show_config(&config, cli.json),
    }
    Ok(())
}

fn show_config(config: &Config, json: bool) {
    let chain_id = config
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "from test".to_string());
    let debug_dir = config
        .debug_dir
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| "none".to_string());
    Output::new(json)
        .field("evm_bin", &config.evm_bin.display().to_string())
        .field_u64("timeout_secs", config.timeout_secs)
        .field_value("trace", serde_json::Value::Bool(config.trace))
        .field("chain_id", &chain_id)
        .field("debug_dir", &debug_dir)
        .message(&format!(
            "EVM binary: {}\nTimeout: {}s\nTrace: {}\nChain ID: {}\nDebug dir: {}",
            config.evm_bin.display(),
            config.timeout_secs,
            config.trace,
            chain_id,
            debug_dir
        ))
        .print();
}
