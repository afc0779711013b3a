//! Main entry point for recon-audit CLI

use clap::Parser;
use recon_audit::cli::Cli;
use recon_audit::commands::{configured_log_dir, configured_log_level, execute_command};
use recon_audit::{duckdb_config, logging};

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging: configured level, then RUST_LOG, then --verbose
    let level = configured_log_level(&cli.command).unwrap_or(log::LevelFilter::Info);
    let log_dir = configured_log_dir(&cli.command);
    if let Err(e) = logging::init(level, cli.verbose, log_dir.as_deref()) {
        eprintln!("Error: cannot open log file: {}", e);
        std::process::exit(1);
    }

    // Fail early when the DuckDB runtime is unusable
    if let Err(e) = duckdb_config::init_duckdb() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Execute the command
    if let Err(e) = execute_command(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
