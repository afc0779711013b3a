//! Document store backed by a JSON or NDJSON export

use super::{KeyQuery, MemoryDocumentStore, SecondarySource};
use crate::config::DocumentStoreConfig;
use crate::error::{ReconError, Result};
use crate::value::{record_from_json, Record};
use std::path::{Path, PathBuf};

/// Documents loaded from an export file and queried by exact key match.
///
/// Accepts either a top-level JSON array or newline-delimited JSON. Extended
/// JSON wrappers (`$date`, `$numberLong`, `$oid`, ...) are unwrapped on load.
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    path: PathBuf,
    inner: MemoryDocumentStore,
}

impl JsonDocumentStore {
    pub fn open(config: &DocumentStoreConfig) -> Result<Self> {
        Self::load(&config.path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconError::config(format!(
                "Document export not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let documents = parse_documents(&content)
            .map_err(|message| ReconError::invalid_input(format!("{}: {}", path.display(), message)))?;

        log::info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryDocumentStore::new(format!("documents:{}", path.display()), documents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SecondarySource for JsonDocumentStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find_by_key(&self, key: &KeyQuery, limit: usize) -> Result<Vec<Record>> {
        self.inner.find_by_key(key, limit)
    }
}

fn parse_documents(content: &str) -> std::result::Result<Vec<Record>, String> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(content).map_err(|e| format!("invalid JSON array: {}", e))?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                record_from_json(value).ok_or_else(|| format!("element {} is not an object", i))
            })
            .collect();
    }

    let mut documents = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| format!("line {}: {}", i + 1, e))?;
        let record = record_from_json(value).ok_or_else(|| format!("line {}: not an object", i + 1))?;
        documents.push(record);
    }
    Ok(documents)
}
