//! Source collaborators: the paginated primary reader and the keyed secondary lookup

pub mod document_store;
pub mod memory;
pub mod warehouse;

use crate::error::Result;
use crate::value::{Record, Value};
use indexmap::IndexMap;

pub use document_store::JsonDocumentStore;
pub use memory::{MemoryDocumentStore, MemoryWarehouse};
pub use warehouse::DuckDbWarehouse;

/// Key field name to the value a counterpart must carry
pub type KeyQuery = IndexMap<String, Value>;

/// The ground-truth dataset, read page by page.
///
/// Pagination must be stable for a static dataset: no record may be skipped
/// or repeated across page boundaries. An empty page means exhaustion.
pub trait PrimarySource {
    fn name(&self) -> &str;

    fn fetch_page(&mut self, offset: u64, limit: usize) -> Result<Vec<Record>>;
}

/// The dataset queried per key for counterparts
pub trait SecondarySource: Send + Sync {
    fn name(&self) -> &str;

    /// Records whose key fields equal `key`, at most `limit` of them
    fn find_by_key(&self, key: &KeyQuery, limit: usize) -> Result<Vec<Record>>;
}

/// True when `record` carries every key value in `key`
pub fn matches_key(record: &Record, key: &KeyQuery) -> bool {
    key.iter().all(|(field, expected)| {
        record
            .get(field)
            .map(|actual| actual.key_eq(expected))
            .unwrap_or(false)
    })
}
