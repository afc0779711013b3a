//! Command-line interface for recon-audit

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recon-audit")]
#[command(about = "Record-level reconciliation between a warehouse and a document store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter configuration file
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = "recon.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Reconcile the warehouse against the document store and write a report
    Run {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override the warehouse page size (must be > 0)
        #[arg(long, value_parser = validate_batch_size)]
        batch_size: Option<usize>,

        /// Abort on the first source error instead of recording it
        #[arg(long)]
        fail_fast: bool,

        /// Classify each page on a thread pool
        #[arg(long)]
        parallel: bool,

        /// Disable the progress spinner
        #[arg(long)]
        no_progress: bool,

        /// Print the report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration without reading any source
    Check {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Display a written report
    Show {
        /// Report file
        report: PathBuf,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

impl Commands {
    /// The configuration file this command reads, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Run { config, .. } | Commands::Check { config } => Some(config),
            _ => None,
        }
    }
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate that batch size is greater than 0
fn validate_batch_size(s: &str) -> Result<usize, String> {
    let batch_size: usize = s
        .parse()
        .map_err(|_| format!("Invalid batch size: '{}'. Must be a positive integer.", s))?;

    if batch_size == 0 {
        return Err("Batch size must be greater than 0".to_string());
    }

    Ok(batch_size)
}
