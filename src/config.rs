//! Run configuration, loaded once from a JSON file

use crate::comparator::{ComparatorRegistry, ComparatorRule};
use crate::engine::{EngineOptions, ReconciliationEngine};
use crate::error::{ReconError, Result};
use crate::matcher::{AmbiguityPolicy, RecordMatcher};
use crate::retry::RetryPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reconciliation_results")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_json_indent() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    pub warehouse: WarehouseConfig,
    pub document_store: DocumentStoreConfig,
    pub reconciliation: ReconciliationSettings,
    #[serde(default)]
    pub comparison_rules: IndexMap<String, ComparatorRule>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    #[serde(default)]
    pub output: OutputSettings,
}

/// The primary source: a DuckDB relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Database file; an in-memory database when unset
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Table name or quoted file path, e.g. `'orders.parquet'`
    pub relation: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pagination order; defaults to the key fields
    #[serde(default)]
    pub order_by: Option<Vec<String>>,
    #[serde(default)]
    pub memory_limit: Option<String>,
}

/// The secondary source: a JSON or NDJSON document export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    pub path: PathBuf,
    /// Upper bound on candidates per key lookup
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    pub key_fields: Vec<String>,
    pub compare_fields: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// When set, each run also logs to `reconciliation_<timestamp>.log` here
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub max_pages: Option<u64>,
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandling {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            continue_on_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            json_indent: default_json_indent(),
        }
    }
}

impl ReconConfig {
    /// Read, resolve relative paths against the file's directory, and validate
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: ReconConfig = serde_json::from_str(&content).map_err(|e| {
            ReconError::config(format!("Invalid configuration {}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Make relative file paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };
        if let Some(database) = &self.warehouse.database {
            self.warehouse.database = Some(resolve(database));
        }
        self.document_store.path = resolve(&self.document_store.path);
        self.reconciliation.output_dir = resolve(&self.reconciliation.output_dir);
        if let Some(log_dir) = &self.reconciliation.log_dir {
            self.reconciliation.log_dir = Some(resolve(log_dir));
        }
    }

    /// Reject configuration the engine could not run with
    pub fn validate(&self) -> Result<()> {
        validate_fields("key_fields", &self.reconciliation.key_fields)?;
        validate_fields("compare_fields", &self.reconciliation.compare_fields)?;

        if self.warehouse.relation.trim().is_empty() {
            return Err(ReconError::config("warehouse.relation must not be empty"));
        }
        if self.warehouse.batch_size == 0 {
            return Err(ReconError::config("warehouse.batch_size must be greater than 0"));
        }
        if self.document_store.batch_size == 0 {
            return Err(ReconError::config("document_store.batch_size must be greater than 0"));
        }
        if let Some(order_by) = &self.warehouse.order_by {
            validate_fields("warehouse.order_by", order_by)?;
        }
        if self.reconciliation.max_pages == Some(0) {
            return Err(ReconError::config("reconciliation.max_pages must be greater than 0"));
        }

        self.retry_delay()?;
        self.log_level_filter()?;

        for (field, rule) in &self.comparison_rules {
            rule.validate(field)?;
        }
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<log::LevelFilter> {
        let level = match self.reconciliation.log_level.to_lowercase().as_str() {
            // warning and critical are accepted as aliases
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            other => other.to_string(),
        };
        log::LevelFilter::from_str(&level).map_err(|_| {
            ReconError::config(format!(
                "Invalid log_level: '{}'. Use off, error, warn, info, debug or trace",
                self.reconciliation.log_level
            ))
        })
    }

    /// The base retry delay; rejects negative, non-finite and out-of-range values
    pub fn retry_delay(&self) -> Result<Duration> {
        let delay = self.error_handling.retry_delay_secs;
        Duration::try_from_secs_f64(delay).map_err(|_| {
            ReconError::config(format!(
                "error_handling.retry_delay_secs must be a non-negative number of seconds, got {}",
                delay
            ))
        })
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(self.error_handling.max_retries, self.retry_delay()?))
    }

    /// Pagination order for the warehouse
    pub fn order_by(&self) -> Vec<String> {
        self.warehouse
            .order_by
            .clone()
            .unwrap_or_else(|| self.reconciliation.key_fields.clone())
    }

    pub fn registry(&self) -> Result<ComparatorRegistry> {
        ComparatorRegistry::from_rules(&self.comparison_rules)
    }

    pub fn engine_options(&self) -> Result<EngineOptions> {
        Ok(EngineOptions {
            batch_size: self.warehouse.batch_size,
            continue_on_error: self.error_handling.continue_on_error,
            parallel: self.reconciliation.parallel,
            max_pages: self.reconciliation.max_pages,
            retry: self.retry_policy()?,
        })
    }

    pub fn build_engine(&self) -> Result<ReconciliationEngine> {
        let matcher = RecordMatcher::new(
            self.reconciliation.key_fields.clone(),
            self.document_store.batch_size,
        )
        .with_ambiguity(self.reconciliation.ambiguity)
        .with_retry(self.retry_policy()?);

        ReconciliationEngine::new(
            matcher,
            self.reconciliation.compare_fields.clone(),
            self.registry()?,
            self.engine_options()?,
        )
    }

    /// Starter configuration written by `init`
    pub fn template() -> Self {
        let mut comparison_rules = IndexMap::new();
        comparison_rules.insert(
            "price".to_string(),
            ComparatorRule::NumericTolerance { tolerance: 0.01 },
        );
        comparison_rules.insert("status".to_string(), ComparatorRule::CaseInsensitive);

        Self {
            warehouse: WarehouseConfig {
                database: None,
                relation: "'warehouse_export.csv'".to_string(),
                batch_size: default_batch_size(),
                order_by: None,
                memory_limit: Some("4GB".to_string()),
            },
            document_store: DocumentStoreConfig {
                path: PathBuf::from("documents.ndjson"),
                batch_size: default_batch_size(),
            },
            reconciliation: ReconciliationSettings {
                key_fields: vec!["id".to_string()],
                compare_fields: vec!["price".to_string(), "status".to_string()],
                output_dir: default_output_dir(),
                log_level: default_log_level(),
                log_dir: None,
                parallel: false,
                max_pages: None,
                ambiguity: AmbiguityPolicy::Flag,
            },
            comparison_rules,
            error_handling: ErrorHandling::default(),
            output: OutputSettings::default(),
        }
    }
}

/// Field lists must be non-empty, without blank or repeated names
pub(crate) fn validate_fields(label: &str, fields: &[String]) -> Result<()> {
    if fields.is_empty() {
        return Err(ReconError::config(format!("{} must not be empty", label)));
    }
    let mut seen = HashSet::new();
    for field in fields {
        if field.trim().is_empty() {
            return Err(ReconError::config(format!("{} contains an empty field name", label)));
        }
        if !seen.insert(field.as_str()) {
            return Err(ReconError::config(format!("{} lists '{}' more than once", label, field)));
        }
    }
    Ok(())
}
