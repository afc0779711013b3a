//! The reconciliation loop: paginate the primary source, match, classify, accumulate

use crate::classifier::{classify, Outcome};
use crate::comparator::ComparatorRegistry;
use crate::config::validate_fields;
use crate::error::{ReconError, Result};
use crate::matcher::{Lookup, MatchResult, RecordMatcher};
use crate::model::{Discrepancy, ErrorEntry, ErrorKind, MissingReason, RunResult, RunStatus, SourceKind};
use crate::progress::ProgressReporter;
use crate::report::{assemble, Report};
use crate::retry::RetryPolicy;
use crate::sources::{PrimarySource, SecondarySource};
use crate::value::Record;
use chrono::Utc;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation, checked before every page fetch
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestration states of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Fetching(u64),
    ClassifyingBatch(u64),
    Finalizing,
    Done,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Primary page size
    pub batch_size: usize,
    pub continue_on_error: bool,
    /// Classify the records of a page on the rayon pool
    pub parallel: bool,
    /// Stop after this many non-empty pages
    pub max_pages: Option<u64>,
    /// Applied to primary page fetches
    pub retry: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::DEFAULT_BATCH_SIZE,
            continue_on_error: true,
            parallel: false,
            max_pages: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ReconciliationEngine {
    matcher: RecordMatcher,
    compare_fields: Vec<String>,
    registry: ComparatorRegistry,
    options: EngineOptions,
}

impl ReconciliationEngine {
    /// Build an engine, rejecting unusable field configuration up front
    pub fn new(
        matcher: RecordMatcher,
        compare_fields: Vec<String>,
        registry: ComparatorRegistry,
        options: EngineOptions,
    ) -> Result<Self> {
        validate_fields("key_fields", matcher.key_fields())?;
        validate_fields("compare_fields", &compare_fields)?;
        if options.batch_size == 0 {
            return Err(ReconError::config("batch_size must be greater than 0"));
        }
        if options.max_pages == Some(0) {
            return Err(ReconError::config("max_pages must be greater than 0"));
        }

        Ok(Self {
            matcher,
            compare_fields,
            registry,
            options,
        })
    }

    pub fn compare_fields(&self) -> &[String] {
        &self.compare_fields
    }

    pub fn registry(&self) -> &ComparatorRegistry {
        &self.registry
    }

    /// Run to completion and assemble the report
    pub fn run<P, S>(&self, primary: &mut P, secondary: &S, cancel: &CancellationToken) -> Result<Report>
    where
        P: PrimarySource + ?Sized,
        S: SecondarySource + ?Sized,
    {
        self.run_with_progress(primary, secondary, cancel, &ProgressReporter::new_minimal())
    }

    pub fn run_with_progress<P, S>(
        &self,
        primary: &mut P,
        secondary: &S,
        cancel: &CancellationToken,
        progress: &ProgressReporter,
    ) -> Result<Report>
    where
        P: PrimarySource + ?Sized,
        S: SecondarySource + ?Sized,
    {
        let result = self.execute(primary, secondary, cancel, progress)?;
        Ok(assemble(result, Utc::now()))
    }

    /// Drive the state machine and return the frozen run result.
    ///
    /// With `continue_on_error` disabled the first unrecoverable source error
    /// is returned and the partial result dropped.
    pub fn execute<P, S>(
        &self,
        primary: &mut P,
        secondary: &S,
        cancel: &CancellationToken,
        progress: &ProgressReporter,
    ) -> Result<RunResult>
    where
        P: PrimarySource + ?Sized,
        S: SecondarySource + ?Sized,
    {
        let batch_size = self.options.batch_size;
        let mut result = RunResult::new(Uuid::new_v4());
        let mut state = EngineState::Idle;
        let mut page: Vec<Record> = Vec::new();
        let mut pages: u64 = 0;

        loop {
            state = match state {
                EngineState::Idle => {
                    log::info!(
                        "Starting reconciliation {}: {} against {}",
                        result.run_id(),
                        primary.name(),
                        secondary.name()
                    );
                    EngineState::Fetching(0)
                }
                EngineState::Fetching(offset) => {
                    if cancel.is_cancelled() {
                        log::warn!("Reconciliation cancelled at offset {}", offset);
                        result.set_status(RunStatus::Cancelled);
                        EngineState::Finalizing
                    } else {
                        self.fetch(&mut *primary, offset, &mut page, &mut pages, &mut result)?
                    }
                }
                EngineState::ClassifyingBatch(offset) => {
                    let batch = std::mem::take(&mut page);
                    self.process_batch(&batch, secondary, &mut result)?;
                    log::info!("Processed {} records...", result.total_records());
                    progress.update(pages, result.total_records(), result.discrepancies().len());
                    EngineState::Fetching(offset + batch_size as u64)
                }
                EngineState::Finalizing => {
                    progress.finish(&format!(
                        "Reconciled {} records, {} discrepancies",
                        result.total_records(),
                        result.discrepancies().len()
                    ));
                    log::info!(
                        "Reconciliation process completed: {} records, {} matching, {} discrepancies, {} errors",
                        result.total_records(),
                        result.matching_records(),
                        result.discrepancies().len(),
                        result.errors().len()
                    );
                    EngineState::Done
                }
                EngineState::Done => break,
            };
        }

        Ok(result)
    }

    /// The `Fetching(offset)` transition
    fn fetch<P>(
        &self,
        primary: &mut P,
        offset: u64,
        page: &mut Vec<Record>,
        pages: &mut u64,
        result: &mut RunResult,
    ) -> Result<EngineState>
    where
        P: PrimarySource + ?Sized,
    {
        let limit = self.options.batch_size;
        let what = format!("page fetch from {} at offset {}", primary.name(), offset);
        let (fetched, attempts) = self.options.retry.run(&what, || primary.fetch_page(offset, limit));

        match fetched {
            Ok(records) if records.is_empty() => Ok(EngineState::Finalizing),
            Ok(records) => {
                if let Some(max_pages) = self.options.max_pages {
                    if *pages >= max_pages {
                        log::error!("{} still returning records after {} pages", primary.name(), max_pages);
                        result.push_error(
                            ErrorEntry::new(
                                SourceKind::Primary,
                                primary.name(),
                                ErrorKind::PageLimitReached,
                                format!("stopped after {} pages", max_pages),
                            )
                            .with_context("offset", offset)
                            .with_context("limit", limit),
                        );
                        result.set_status(RunStatus::Halted);
                        return Ok(EngineState::Finalizing);
                    }
                }
                log::debug!("Fetched {} records at offset {}", records.len(), offset);
                *page = records;
                *pages += 1;
                Ok(EngineState::ClassifyingBatch(offset))
            }
            Err(e) => {
                log::error!("Error fetching data from {}: {}", primary.name(), e);
                if !self.options.continue_on_error {
                    return Err(e);
                }
                result.push_error(
                    ErrorEntry::new(
                        SourceKind::Primary,
                        primary.name(),
                        ErrorKind::SourceUnavailable,
                        e.to_string(),
                    )
                    .with_context("offset", offset)
                    .with_context("limit", limit)
                    .with_context("attempts", attempts),
                );
                result.set_status(RunStatus::Halted);
                Ok(EngineState::Finalizing)
            }
        }
    }

    fn process_batch<S>(&self, batch: &[Record], secondary: &S, result: &mut RunResult) -> Result<()>
    where
        S: SecondarySource + ?Sized,
    {
        if self.options.parallel {
            // Collecting an indexed parallel iterator keeps page order
            let resolved: Vec<(MatchResult, Outcome)> = batch
                .par_iter()
                .map(|record| self.resolve(record, secondary))
                .collect();
            for (record, (matched, outcome)) in batch.iter().zip(resolved) {
                self.fold(record, matched, outcome, result)?;
            }
        } else {
            for record in batch {
                let (matched, outcome) = self.resolve(record, secondary);
                self.fold(record, matched, outcome, result)?;
            }
        }
        Ok(())
    }

    fn resolve<S>(&self, record: &Record, secondary: &S) -> (MatchResult, Outcome)
    where
        S: SecondarySource + ?Sized,
    {
        let matched = self.matcher.find_counterpart(record, secondary);
        let outcome = classify(record, matched.counterpart(), &self.compare_fields, &self.registry);
        (matched, outcome)
    }

    fn fold(&self, record: &Record, matched: MatchResult, outcome: Outcome, result: &mut RunResult) -> Result<()> {
        result.count_record();

        let reason = matched.missing_reason().unwrap_or(MissingReason::NotFound);
        let MatchResult { lookup, errors } = matched;

        if matches!(lookup, Lookup::Failed) && !self.options.continue_on_error {
            let message = errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "lookup failed".to_string());
            return Err(ReconError::source_unavailable(SourceKind::Secondary, message));
        }
        for error in errors {
            result.push_error(error);
        }

        match (outcome, lookup) {
            (Outcome::Match, _) => result.count_match(),
            (Outcome::FieldMismatch(field_diffs), Lookup::Found(secondary_record)) => {
                log::debug!("Field mismatch on {} fields", field_diffs.len());
                result.push_discrepancy(Discrepancy::FieldMismatch {
                    primary_record: record.clone(),
                    secondary_record,
                    field_diffs,
                });
            }
            _ => {
                log::debug!("No counterpart ({:?}) for record {:?}", reason, record);
                result.push_discrepancy(Discrepancy::MissingCounterpart {
                    primary_record: record.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
