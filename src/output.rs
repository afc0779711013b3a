//! Output formatting and the JSON report sink

use crate::config::ReconConfig;
use crate::error::{ReconError, Result};
use crate::model::{Discrepancy, ErrorKind, MissingReason, RunStatus};
use crate::report::Report;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How many discrepancies `show` lists before summarising the rest
const DISCREPANCY_PREVIEW: usize = 10;

/// Pretty printer for recon-audit output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the run summary after a report has been written
    pub fn print_report_summary(report: &Report, written_to: Option<&Path>) {
        let summary = &report.summary;
        let icon = if report.is_clean() { "✅" } else { "⚠️" };
        println!("{} Reconciliation {} ({})", icon, report.run_id, status_label(report.status));
        println!("├─ Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("├─ Records: {}", summary.total_records);
        println!("├─ Matching: {}", summary.matching_records);
        println!(
            "├─ Discrepancies: {} ({} missing, {} mismatched)",
            summary.discrepancy_count,
            report.missing_count(),
            report.mismatch_count()
        );
        match written_to {
            Some(path) => {
                println!("├─ Errors: {}", summary.error_count);
                println!("└─ Report: {}", path.display());
            }
            None => println!("└─ Errors: {}", summary.error_count),
        }
    }

    /// Print a report with a preview of its discrepancies and every error entry
    pub fn print_report(report: &Report) {
        Self::print_report_summary(report, None);

        if !report.discrepancies.is_empty() {
            println!();
            println!("🔍 Discrepancies:");
            let shown = report.discrepancies.len().min(DISCREPANCY_PREVIEW);
            for (i, discrepancy) in report.discrepancies.iter().take(shown).enumerate() {
                let last = i == shown - 1 && report.discrepancies.len() <= shown;
                print_discrepancy(discrepancy, last);
            }
            if report.discrepancies.len() > shown {
                println!("└─ ... and {} more", report.discrepancies.len() - shown);
            }
        }

        if !report.errors.is_empty() {
            println!();
            println!("❌ Errors:");
            for (i, error) in report.errors.iter().enumerate() {
                let prefix = if i == report.errors.len() - 1 { "└─" } else { "├─" };
                println!(
                    "{} [{} {}] {}: {}",
                    prefix,
                    error.source,
                    error_kind_label(error.kind),
                    error.source_name,
                    error.message
                );
            }
        }
    }

    /// Print what a validated configuration will do
    pub fn print_check(config: &ReconConfig, rules: &[(String, String)]) {
        println!("✅ Configuration is valid");
        println!("├─ Warehouse: {}", config.warehouse.relation);
        if let Some(database) = &config.warehouse.database {
            println!("│  ├─ Database: {}", database.display());
        }
        println!("│  ├─ Order by: {}", config.order_by().join(", "));
        println!("│  └─ Batch size: {}", config.warehouse.batch_size);
        println!("├─ Documents: {}", config.document_store.path.display());
        println!("├─ Key fields: {}", config.reconciliation.key_fields.join(", "));
        println!("├─ Compare fields:");
        for (i, (field, rule)) in rules.iter().enumerate() {
            let prefix = if i == rules.len() - 1 { "│  └─" } else { "│  ├─" };
            println!("{} {}: {}", prefix, field, rule);
        }
        println!(
            "├─ Retries: {} (delay {}s, continue on error: {})",
            config.error_handling.max_retries,
            config.error_handling.retry_delay_secs,
            config.error_handling.continue_on_error
        );
        println!("└─ Output: {}", config.reconciliation.output_dir.display());
    }
}

fn print_discrepancy(discrepancy: &Discrepancy, last: bool) {
    let (prefix, child) = if last { ("└─", "   ") } else { ("├─", "│  ") };
    let key = serde_json::to_string(discrepancy.primary_record()).unwrap_or_default();
    match discrepancy {
        Discrepancy::MissingCounterpart { reason, .. } => {
            println!("{} missing ({}): {}", prefix, missing_reason_label(*reason), key);
        }
        Discrepancy::FieldMismatch { field_diffs, .. } => {
            println!("{} mismatch: {}", prefix, key);
            for (i, diff) in field_diffs.iter().enumerate() {
                let branch = if i == field_diffs.len() - 1 { "└─" } else { "├─" };
                match &diff.fault {
                    Some(fault) => println!(
                        "{}{} {}: {} vs {} ({})",
                        child, branch, diff.field, diff.primary_value, diff.secondary_value, fault
                    ),
                    None => println!(
                        "{}{} {}: {} vs {}",
                        child, branch, diff.field, diff.primary_value, diff.secondary_value
                    ),
                }
            }
        }
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Halted => "halted",
    }
}

fn missing_reason_label(reason: MissingReason) -> &'static str {
    match reason {
        MissingReason::NotFound => "not found",
        MissingReason::IncompleteKey => "incomplete key",
        MissingReason::LookupFailed => "lookup failed",
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::SourceUnavailable => "unavailable",
        ErrorKind::MatchAmbiguous => "ambiguous",
        ErrorKind::PageLimitReached => "page limit",
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format with an explicit indent width
    pub fn format_with_indent<T: Serialize + ?Sized>(data: &T, indent: usize) -> Result<String> {
        let indent = " ".repeat(indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        data.serialize(&mut serializer)?;
        String::from_utf8(buffer).map_err(|e| ReconError::invalid_input(e.to_string()))
    }
}

/// Persists reports as timestamped JSON files
pub struct ReportWriter {
    output_dir: PathBuf,
    indent: usize,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, indent: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            indent,
        }
    }

    /// File name for a report: generation time plus the run id prefix
    pub fn file_name(report: &Report) -> String {
        let run_id = report.run_id.simple().to_string();
        format!(
            "reconciliation_report_{}_{}.json",
            report.generated_at.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        )
    }

    pub fn write(&self, report: &Report) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(Self::file_name(report));
        let mut content = JsonFormatter::format_with_indent(report, self.indent)?;
        content.push('\n');
        std::fs::write(&path, content)?;

        log::info!("Report saved to {}", path.display());
        Ok(path)
    }
}

/// Read a report previously written by [`ReportWriter`].
///
/// Values come back through their JSON form, so a timestamp in a record or
/// field diff is returned as its RFC 3339 [`Value::String`](crate::value::Value::String)
/// rather than a `Value::Timestamp`.
pub fn load_report(path: &Path) -> Result<Report> {
    if !path.exists() {
        return Err(ReconError::invalid_input(format!(
            "Report not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ReconError::invalid_input(format!("Not a reconciliation report {}: {}", path.display(), e)))
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
