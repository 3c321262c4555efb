#![deny(unsafe_code)]
//! IAI operator binary
//!
//! - `iai run`: evolve the synthetic drifting workload under an Authority
//! - `iai verify`: check a JSONL audit log's hash chain
//! - `iai summary`: print the summary of a finished run

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod workload;

use config::IaiConfig;

/// IAI CLI
#[derive(Parser)]
#[command(name = "iai")]
#[command(about = "IAI - Invariant-anchored evolution with an external Authority", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "IAI_CONFIG", global = true)]
    config: Option<String>,

    /// Log filter, overrides the configured level (RUST_LOG wins over both)
    #[arg(long, env = "IAI_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "IAI_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run an evolution with the configured oracle
    Run {
        /// Maximum generations
        #[arg(short = 'n', long)]
        generations: Option<u32>,

        /// Run directory for artifacts and the audit log
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a JSONL audit log
    Verify {
        /// Audit log path
        audit_file: PathBuf,
    },

    /// Print the summary of a run directory
    Summary {
        /// Run directory
        run_dir: PathBuf,

        /// Print the raw JSON summary
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = IaiConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level.clone() {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Run {
            generations,
            output,
        } => {
            // Override with CLI args
            if let Some(n) = generations {
                config.run.max_generations = n;
            }
            if let Some(dir) = output {
                config.run.output_dir = dir;
            }
            commands::run(config).await?;
        }
        Commands::Verify { audit_file } => {
            if !commands::verify(&audit_file).await?.valid {
                std::process::exit(1);
            }
        }
        Commands::Summary { run_dir, raw } => {
            commands::summary(&run_dir, raw).await?;
        }
    }
    Ok(())
}
