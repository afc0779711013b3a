//! Command implementations for recon-audit CLI

use crate::cli::{Commands, OutputFormat};
use crate::config::ReconConfig;
use crate::engine::CancellationToken;
use crate::error::{ReconError, Result};
use crate::output::{format_bytes, load_report, JsonFormatter, PrettyPrinter, ReportWriter};
use crate::progress::ProgressReporter;
use crate::sources::{DuckDbWarehouse, JsonDocumentStore};
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Init { path, force } => init_command(&path, force),
        Commands::Run {
            config,
            output_dir,
            batch_size,
            fail_fast,
            parallel,
            no_progress,
            json,
        } => {
            let overrides = RunOverrides {
                output_dir,
                batch_size,
                fail_fast,
                parallel,
            };
            run_command(&config, &overrides, !no_progress, json).map(|_| ())
        }
        Commands::Check { config } => check_command(&config),
        Commands::Show { report, format } => show_command(&report, &format),
    }
}

/// Log level requested by the command's configuration file, if it has a readable one
pub fn configured_log_level(command: &Commands) -> Option<log::LevelFilter> {
    peek_config(command)?.log_level_filter().ok()
}

/// Directory for the run log file, if the command's configuration names one
pub fn configured_log_dir(command: &Commands) -> Option<PathBuf> {
    match command {
        Commands::Run { .. } => peek_config(command)?.reconciliation.log_dir,
        _ => None,
    }
}

/// Best-effort read of the command's configuration before logging starts
fn peek_config(command: &Commands) -> Option<ReconConfig> {
    let path = command.config_path()?;
    let content = std::fs::read_to_string(path).ok()?;
    let mut config: ReconConfig = serde_json::from_str(&content).ok()?;
    config.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
    Some(config)
}

/// Command-line settings layered over the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub output_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub fail_fast: bool,
    pub parallel: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut ReconConfig) {
        if let Some(dir) = &self.output_dir {
            config.reconciliation.output_dir = dir.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.warehouse.batch_size = batch_size;
        }
        if self.fail_fast {
            config.error_handling.continue_on_error = false;
        }
        if self.parallel {
            config.reconciliation.parallel = true;
        }
    }
}

/// Write a starter configuration
fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ReconError::config(format!(
            "{} already exists. Use --force to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&ReconConfig::template())?;
    std::fs::write(path, content + "\n")?;

    println!("✅ Wrote configuration template to: {}", path.display());
    println!("📝 Edit the warehouse relation, document export and field lists before running");
    Ok(())
}

/// Run one reconciliation and write its report; returns the report path
pub fn run_command(
    config_path: &Path,
    overrides: &RunOverrides,
    show_progress: bool,
    json: bool,
) -> Result<PathBuf> {
    let mut config = ReconConfig::load(config_path)?;
    overrides.apply(&mut config);
    config.validate()?;

    let engine = config.build_engine()?;
    let base_dir = config_path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut warehouse = DuckDbWarehouse::open(&config.warehouse, config.order_by(), base_dir)?;
    let documents = JsonDocumentStore::open(&config.document_store)?;

    let progress = if show_progress && !json {
        ProgressReporter::new_for_run()
    } else {
        ProgressReporter::new_minimal()
    };
    let cancel = CancellationToken::new();
    let report = engine.run_with_progress(&mut warehouse, &documents, &cancel, &progress)?;
    drop(progress);

    let writer = ReportWriter::new(&config.reconciliation.output_dir, config.output.json_indent);
    let path = writer.write(&report)?;

    if json {
        println!("{}", JsonFormatter::format(&report)?);
    } else {
        PrettyPrinter::print_report_summary(&report, Some(&path));
    }
    Ok(path)
}

/// Validate a configuration and print the resolved comparison rules
fn check_command(config_path: &Path) -> Result<()> {
    let config = ReconConfig::load(config_path)?;
    let engine = config.build_engine()?;

    let rules: Vec<(String, String)> = engine
        .compare_fields()
        .iter()
        .map(|field| (field.clone(), engine.registry().resolve(field).name()))
        .collect();

    for field in config.comparison_rules.keys() {
        if !config.reconciliation.compare_fields.contains(field) {
            log::warn!("Comparison rule for '{}' is unused: not a compare field", field);
        }
    }

    PrettyPrinter::print_check(&config, &rules);
    Ok(())
}

/// Display a written report
fn show_command(report_path: &Path, format: &str) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(ReconError::invalid_input)?;
    let report = load_report(report_path)?;

    match output_format {
        OutputFormat::Json => println!("{}", JsonFormatter::format(&report)?),
        OutputFormat::Pretty => {
            let size = std::fs::metadata(report_path)?.len();
            println!("📄 {} ({})", report_path.display(), format_bytes(size));
            PrettyPrinter::print_report(&report);
        }
    }
    Ok(())
}
