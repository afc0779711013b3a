//! # recon-audit
//!
//! Record-level reconciliation between a primary warehouse and a secondary
//! document store. Records are paged from the warehouse, matched to documents
//! by key fields, compared field by field under per-field rules, and the
//! outcome is written as a JSON report of discrepancies and retrieval errors.

pub mod classifier;
pub mod cli;
pub mod commands;
pub mod comparator;
pub mod config;
pub mod duckdb_config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod output;
pub mod progress;
pub mod report;
pub mod retry;
pub mod sources;
pub mod value;

pub use config::ReconConfig;
pub use engine::{CancellationToken, ReconciliationEngine};
pub use error::{Result, ReconError};
pub use report::Report;
pub use value::{Record, Value};

/// Default page size for the warehouse and candidate bound for lookups
pub const DEFAULT_BATCH_SIZE: usize = 10000;
