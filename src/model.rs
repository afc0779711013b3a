//! Discrepancies, error entries and the per-run result they accumulate into

use crate::value::{Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which side of the reconciliation a record or error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Primary,
    Secondary,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Why a primary record has no counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The secondary store returned nothing for the key
    NotFound,
    /// A key field was absent or null, so no lookup was made
    IncompleteKey,
    /// The secondary lookup failed; see the matching error entry
    LookupFailed,
}

fn missing_value() -> Value {
    Value::Missing
}

/// One compare-field whose values were judged different
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    #[serde(default = "missing_value", skip_serializing_if = "Value::is_missing")]
    pub primary_value: Value,
    #[serde(default = "missing_value", skip_serializing_if = "Value::is_missing")]
    pub secondary_value: Value,
    /// Set when the field's comparator could not evaluate the pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    MissingCounterpart {
        primary_record: Record,
        reason: MissingReason,
    },
    FieldMismatch {
        primary_record: Record,
        secondary_record: Record,
        field_diffs: Vec<FieldDiff>,
    },
}

impl Discrepancy {
    pub fn primary_record(&self) -> &Record {
        match self {
            Self::MissingCounterpart { primary_record, .. } => primary_record,
            Self::FieldMismatch { primary_record, .. } => primary_record,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingCounterpart { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    MatchAmbiguous,
    PageLimitReached,
}

/// A retrieval problem recorded without aborting the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub source: SourceKind,
    pub source_name: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl ErrorEntry {
    pub fn new(
        source: SourceKind,
        source_name: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_name: source_name.into(),
            kind,
            message: message.into(),
            context: serde_json::Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The primary source was read to exhaustion
    Completed,
    /// Stopped by the cancellation token
    Cancelled,
    /// Stopped early by an unrecoverable primary error or the page bound
    Halted,
}

/// Accumulated state of one reconciliation run.
///
/// Counts only increase and sequences only grow; the engine is the sole writer.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub(crate) run_id: Uuid,
    pub(crate) total_records: u64,
    pub(crate) matching_records: u64,
    pub(crate) discrepancies: Vec<Discrepancy>,
    pub(crate) errors: Vec<ErrorEntry>,
    pub(crate) status: RunStatus,
}

impl RunResult {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            total_records: 0,
            matching_records: 0,
            discrepancies: Vec::new(),
            errors: Vec::new(),
            status: RunStatus::Completed,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn matching_records(&self) -> u64 {
        self.matching_records
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub(crate) fn count_record(&mut self) {
        self.total_records += 1;
    }

    pub(crate) fn count_match(&mut self) {
        self.matching_records += 1;
    }

    pub(crate) fn push_discrepancy(&mut self, discrepancy: Discrepancy) {
        self.discrepancies.push(discrepancy);
    }

    pub(crate) fn push_error(&mut self, error: ErrorEntry) {
        self.errors.push(error);
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }
}
