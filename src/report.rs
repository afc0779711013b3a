//! Report assembly from a finished run

use crate::model::{Discrepancy, ErrorEntry, RunResult, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_records: u64,
    pub matching_records: u64,
    pub discrepancy_count: usize,
    pub error_count: usize,
}

/// The persisted outcome of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub status: RunStatus,
    pub summary: Summary,
    pub discrepancies: Vec<Discrepancy>,
    pub errors: Vec<ErrorEntry>,
}

impl Report {
    pub fn missing_count(&self) -> usize {
        self.discrepancies.iter().filter(|d| d.is_missing()).count()
    }

    pub fn mismatch_count(&self) -> usize {
        self.discrepancies.len() - self.missing_count()
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty() && self.errors.is_empty()
    }
}

/// Freeze a run result into its report shape. Performs no I/O.
pub fn assemble(result: RunResult, generated_at: DateTime<Utc>) -> Report {
    let summary = Summary {
        total_records: result.total_records,
        matching_records: result.matching_records,
        discrepancy_count: result.discrepancies.len(),
        error_count: result.errors.len(),
    };

    Report {
        run_id: result.run_id,
        generated_at,
        status: result.status,
        summary,
        discrepancies: result.discrepancies,
        errors: result.errors,
    }
}
