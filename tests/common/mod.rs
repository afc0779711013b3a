//! Common test utilities and helpers

use recon_audit::comparator::ComparatorRegistry;
use recon_audit::engine::{EngineOptions, ReconciliationEngine};
use recon_audit::error::{ReconError, Result};
use recon_audit::matcher::RecordMatcher;
use recon_audit::model::SourceKind;
use recon_audit::retry::RetryPolicy;
use recon_audit::sources::{KeyQuery, MemoryDocumentStore, MemoryWarehouse, PrimarySource, SecondarySource};
use recon_audit::value::{record_from_json, Record};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Test fixture manager for creating temporary test environments
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a CSV file from rows, the first being the header
    pub fn create_csv(&self, name: &str, data: &[Vec<&str>]) -> Result<PathBuf> {
        let path = self.root().join(name);
        let mut content = String::new();
        for row in data {
            content.push_str(&row.join(","));
            content.push('\n');
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a newline-delimited JSON export, one document per line
    pub fn create_ndjson(&self, name: &str, documents: &[serde_json::Value]) -> Result<PathBuf> {
        let path = self.root().join(name);
        let mut content = String::new();
        for doc in documents {
            content.push_str(&serde_json::to_string(doc)?);
            content.push('\n');
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn create_json(&self, name: &str, data: &serde_json::Value) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::write(&path, serde_json::to_string_pretty(data)?)?;
        Ok(path)
    }

    /// Write a run configuration over a CSV relation and an NDJSON export
    pub fn create_config(&self, name: &str, csv: &Path, documents: &Path, extra: serde_json::Value) -> Result<PathBuf> {
        let mut config = json!({
            "warehouse": {
                "relation": format!("'{}'", csv.display()),
                "batch_size": 2
            },
            "document_store": {"path": documents},
            "reconciliation": {
                "key_fields": ["id"],
                "compare_fields": ["price", "status"],
                "output_dir": self.root().join("results")
            },
            "comparison_rules": {
                "price": {"rule": "numeric_tolerance", "tolerance": 0.01},
                "status": {"rule": "case_insensitive"}
            },
            "error_handling": {"max_retries": 0, "retry_delay_secs": 0.0}
        });
        merge(&mut config, extra);
        self.create_json(name, &config)
    }

    /// Reports written under the fixture's results directory
    pub fn reports(&self) -> Vec<PathBuf> {
        let dir = self.root().join("results");
        let mut reports: Vec<PathBuf> = fs::read_dir(&dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        reports.sort();
        reports
    }

    /// The standard order export pair: 4 warehouse rows against 3 documents
    pub fn create_order_sources(&self) -> Result<(PathBuf, PathBuf)> {
        let csv = self.create_csv(
            "orders.csv",
            &[
                vec!["id", "price", "status"],
                vec!["1", "10.001", "open"],
                vec!["2", "20.0", "closed"],
                vec!["3", "30.0", "open"],
                vec!["4", "40.0", "open"],
            ],
        )?;
        let docs = self.create_ndjson(
            "orders.ndjson",
            &[
                json!({"id": 1, "price": 10.002, "status": "OPEN"}),
                json!({"id": 2, "price": 20.5, "status": "closed"}),
                json!({"id": 3, "price": 30.0, "status": "open"}),
            ],
        )?;
        Ok((csv, docs))
    }
}

/// Deep-merge `extra` into `base`
fn merge(base: &mut serde_json::Value, extra: serde_json::Value) {
    match (base, extra) {
        (serde_json::Value::Object(base), serde_json::Value::Object(extra)) => {
            for (key, value) in extra {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, extra) => *base = extra,
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run a recon-audit command and return the result
    pub fn run_command(&self, args: &[&str]) -> Result<()> {
        use clap::Parser;
        use recon_audit::cli::Cli;
        use recon_audit::commands::execute_command;

        let mut cmd_args = vec!["recon-audit"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args).map_err(|e| ReconError::invalid_input(e.to_string()))?;
        execute_command(cli.command)
    }

    /// Run a command and expect it to succeed
    pub fn expect_success(&self, args: &[&str]) {
        self.run_command(args).expect("Command should succeed");
    }

    /// Run a command and expect it to fail
    pub fn expect_failure(&self, args: &[&str]) -> ReconError {
        self.run_command(args).expect_err("Command should fail")
    }
}

pub fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
    values
        .into_iter()
        .map(|v| record_from_json(v).expect("test records are objects"))
        .collect()
}

pub fn record(value: serde_json::Value) -> Record {
    record_from_json(value).expect("test records are objects")
}

pub fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Options with no retry delays so failure tests stay fast
pub fn fast_options(batch_size: usize) -> EngineOptions {
    EngineOptions {
        batch_size,
        retry: RetryPolicy::none(),
        ..Default::default()
    }
}

pub fn build_engine(
    key_fields: &[&str],
    compare_fields: &[&str],
    registry: ComparatorRegistry,
    options: EngineOptions,
) -> ReconciliationEngine {
    let retry = options.retry.clone();
    ReconciliationEngine::new(
        RecordMatcher::new(fields(key_fields), 10).with_retry(retry),
        fields(compare_fields),
        registry,
        options,
    )
    .expect("valid engine configuration")
}

pub fn warehouse(values: Vec<serde_json::Value>) -> MemoryWarehouse {
    MemoryWarehouse::new("warehouse", records(values))
}

pub fn documents(values: Vec<serde_json::Value>) -> MemoryDocumentStore {
    MemoryDocumentStore::new("documents", records(values))
}

/// Primary source failing its first `failures` fetches, or every fetch at `fail_at_offset`
pub struct FlakyWarehouse {
    inner: MemoryWarehouse,
    failures: usize,
    fail_at_offset: Option<u64>,
    pub calls: usize,
}

impl FlakyWarehouse {
    pub fn failing_first(inner: MemoryWarehouse, failures: usize) -> Self {
        Self {
            inner,
            failures,
            fail_at_offset: None,
            calls: 0,
        }
    }

    pub fn failing_at(inner: MemoryWarehouse, offset: u64) -> Self {
        Self {
            inner,
            failures: 0,
            fail_at_offset: Some(offset),
            calls: 0,
        }
    }
}

impl PrimarySource for FlakyWarehouse {
    fn name(&self) -> &str {
        "flaky-warehouse"
    }

    fn fetch_page(&mut self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        self.calls += 1;
        if self.calls <= self.failures || self.fail_at_offset == Some(offset) {
            return Err(ReconError::source_unavailable(SourceKind::Primary, "connection reset"));
        }
        self.inner.fetch_page(offset, limit)
    }
}

/// Primary source whose pages never run out
pub struct EndlessWarehouse {
    pub calls: usize,
}

impl PrimarySource for EndlessWarehouse {
    fn name(&self) -> &str {
        "endless-warehouse"
    }

    fn fetch_page(&mut self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        self.calls += 1;
        Ok((0..limit as u64)
            .map(|i| record(json!({"id": offset + i, "status": "open"})))
            .collect())
    }
}

/// Secondary source counting lookups, optionally failing for selected ids
pub struct CountingDocumentStore {
    inner: MemoryDocumentStore,
    failing_ids: Vec<i64>,
    failures_before_success: usize,
    calls: AtomicUsize,
}

impl CountingDocumentStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            failing_ids: Vec::new(),
            failures_before_success: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every lookup for these ids fails
    pub fn failing_for(mut self, ids: &[i64]) -> Self {
        self.failing_ids = ids.to_vec();
        self
    }

    /// The first `n` lookups fail, later ones succeed
    pub fn failing_first(mut self, n: usize) -> Self {
        self.failures_before_success = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecondarySource for CountingDocumentStore {
    fn name(&self) -> &str {
        "counting-documents"
    }

    fn find_by_key(&self, key: &KeyQuery, limit: usize) -> Result<Vec<Record>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let id = key.get("id").and_then(|v| v.as_f64()).map(|f| f as i64);
        let failing_id = id.map(|id| self.failing_ids.contains(&id)).unwrap_or(false);
        if failing_id || call <= self.failures_before_success {
            return Err(ReconError::source_unavailable(SourceKind::Secondary, "server selection timeout"));
        }
        self.inner.find_by_key(key, limit)
    }
}
