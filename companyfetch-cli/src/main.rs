//! companyfetch CLI: fetch company data and inspect the output directory.
//!
//! Commands:
//! - `fetch`: walk the symbol list and write per-symbol files from Yahoo Finance
//! - `status`: list symbol directories with their artifacts and completion marker

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use companyfetch_core::data::{CircuitBreaker, YahooProvider};
use companyfetch_runner::{
    directory_status, run_from_config, CompletionPolicy, FetchConfig, TracingProgress,
    DEFAULT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "companyfetch",
    about = "Fetch per-company financial data from Yahoo Finance into per-symbol files"
)]
struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch metadata, calendar and price history for every listed symbol.
    Fetch {
        /// Path to a TOML config file. Defaults to ./companyfetch.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base directory for the symbol list and the output directory.
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Seconds between symbols (0 disables pacing).
        #[arg(long)]
        delay_secs: Option<u64>,

        /// What marks a symbol as already fetched: marker or directory.
        #[arg(long)]
        completion: Option<CompletionPolicy>,

        /// Only fetch these symbols (repeatable). List order is kept.
        #[arg(long = "symbol", value_name = "SYMBOL")]
        symbols: Vec<String>,
    },
    /// Report which symbols have been fetched and which files they have.
    Status {
        /// Path to a TOML config file. Defaults to ./companyfetch.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base directory for the output directory.
        #[arg(long)]
        data_root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Fetch {
            config,
            data_root,
            delay_secs,
            completion,
            symbols,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(root) = data_root {
                config.data_root = root;
            }
            if let Some(secs) = delay_secs {
                config.pacing_secs = secs;
            }
            if let Some(policy) = completion {
                config.completion = policy;
            }
            run_fetch(&config, &symbols)
        }
        Commands::Status { config, data_root } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(root) = data_root {
                config.data_root = root;
            }
            run_status(&config)
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    Ok(())
}

/// Explicit `--config`, else `./companyfetch.toml` if present, else defaults.
fn load_config(path: Option<&Path>) -> Result<FetchConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(FetchConfig::default());
            }
            default
        }
    };

    let config = FetchConfig::from_file(&path)
        .with_context(|| format!("loading config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Per-symbol failures and an unusable symbol list are reported through the
/// log only; the process still exits 0.
fn run_fetch(config: &FetchConfig, only: &[String]) -> Result<()> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(circuit_breaker, config.provider.yahoo_options())?;
    let progress = TracingProgress;

    match run_from_config(config, &provider, &progress, only) {
        Ok(summary) => {
            for report in summary.failures() {
                tracing::debug!(
                    symbol = %report.symbol,
                    error = report.error.as_deref().unwrap_or(""),
                    "failed symbol"
                );
            }
        }
        Err(e) => tracing::error!(error = %e, "fetch run aborted"),
    }
    Ok(())
}

fn run_status(config: &FetchConfig) -> Result<()> {
    let output_root = config.output_root();
    let statuses = directory_status(&output_root)?;

    if statuses.is_empty() {
        println!("No symbol directories under {}", output_root.display());
        return Ok(());
    }

    let complete = statuses.iter().filter(|s| s.is_complete()).count();
    println!("Output: {}", output_root.display());
    println!("Symbols: {} ({complete} complete)", statuses.len());
    println!();
    println!("{:<10} {:<9} {:>7}  Files", "Symbol", "Complete", "Rows");
    println!("{}", "-".repeat(60));

    for status in &statuses {
        let rows = status
            .marker
            .as_ref()
            .map_or_else(|| "-".to_string(), |m| m.history_rows.to_string());
        let files = if status.artifacts.is_empty() {
            "(empty)".to_string()
        } else {
            status.artifacts.join(" ")
        };
        println!(
            "{:<10} {:<9} {:>7}  {}",
            status.symbol,
            if status.is_complete() { "yes" } else { "no" },
            rows,
            files
        );
    }

    Ok(())
}
