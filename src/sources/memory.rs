//! In-memory sources for embedding and tests

use super::{matches_key, KeyQuery, PrimarySource, SecondarySource};
use crate::error::Result;
use crate::value::Record;

/// A primary source over a fixed, ordered set of records
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    name: String,
    records: Vec<Record>,
}

impl MemoryWarehouse {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PrimarySource for MemoryWarehouse {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_page(&mut self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.records.len());
        let end = start.saturating_add(limit).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }
}

/// A secondary source scanning documents in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    name: String,
    documents: Vec<Record>,
}

impl MemoryDocumentStore {
    pub fn new(name: impl Into<String>, documents: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SecondarySource for MemoryDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_by_key(&self, key: &KeyQuery, limit: usize) -> Result<Vec<Record>> {
        Ok(self
            .documents
            .iter()
            .filter(|doc| matches_key(doc, key))
            .take(limit)
            .cloned()
            .collect())
    }
}
