//! Edge case tests for unreachable or flaky sources

use crate::common::{
    build_engine, documents, fast_options, warehouse, CliTestRunner, CountingDocumentStore, FlakyWarehouse,
};
use recon_audit::comparator::ComparatorRegistry;
use recon_audit::engine::{CancellationToken, EngineOptions};
use recon_audit::error::ReconError;
use recon_audit::model::{Discrepancy, ErrorKind, MissingReason, RunStatus, SourceKind};
use recon_audit::retry::RetryPolicy;
use serde_json::json;
use std::time::Duration;

fn retrying(batch_size: usize, retries: u32) -> EngineOptions {
    EngineOptions {
        retry: RetryPolicy::new(retries, Duration::ZERO),
        ..fast_options(batch_size)
    }
}

fn pair(ids: &[i64]) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
    let data: Vec<serde_json::Value> = ids.iter().map(|id| json!({"id": id, "v": 1})).collect();
    (data.clone(), data)
}

#[test]
fn test_transient_primary_failure_recovered_by_retry() {
    let (p, s) = pair(&[1, 2, 3]);
    let mut primary = FlakyWarehouse::failing_first(warehouse(p), 2);
    let secondary = documents(s);

    let report = build_engine(&["id"], &["v"], ComparatorRegistry::new(), retrying(10, 3))
        .run(&mut primary, &secondary, &CancellationToken::new())
        .unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.summary.matching_records, 3);
    assert_eq!(report.status, RunStatus::Completed);
}

#[test]
fn test_primary_failure_after_retries_records_attempts() {
    let (p, s) = pair(&[1, 2, 3, 4]);
    let mut primary = FlakyWarehouse::failing_at(warehouse(p), 2);
    let secondary = documents(s);

    let report = build_engine(&["id"], &["v"], ComparatorRegistry::new(), retrying(2, 2))
        .run(&mut primary, &secondary, &CancellationToken::new())
        .unwrap();

    // The first page was processed before the failure halted the run
    assert_eq!(report.summary.total_records, 2);
    assert_eq!(report.summary.matching_records, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].context["attempts"], 3);
    assert_eq!(report.errors[0].context["offset"], 2);
    assert_eq!(report.status, RunStatus::Halted);
    // 1 successful fetch plus 3 failed attempts
    assert_eq!(primary.calls, 4);
}

#[test]
fn test_fail_fast_propagates_primary_error() {
    let (p, s) = pair(&[1, 2]);
    let mut primary = FlakyWarehouse::failing_at(warehouse(p), 0);
    let secondary = documents(s);
    let options = EngineOptions {
        continue_on_error: false,
        ..fast_options(10)
    };

    let result = build_engine(&["id"], &["v"], ComparatorRegistry::new(), options)
        .run(&mut primary, &secondary, &CancellationToken::new());

    assert!(matches!(
        result,
        Err(ReconError::SourceUnavailable {
            source_kind: SourceKind::Primary,
            ..
        })
    ));
}

#[test]
fn test_secondary_failure_marks_record_and_continues() {
    let (p, s) = pair(&[1, 2, 3]);
    let mut primary = warehouse(p);
    let secondary = CountingDocumentStore::new(documents(s)).failing_for(&[2]);

    let report = build_engine(&["id"], &["v"], ComparatorRegistry::new(), retrying(10, 1))
        .run(&mut primary, &secondary, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.summary.total_records, 3);
    assert_eq!(report.summary.matching_records, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source, SourceKind::Secondary);
    assert_eq!(report.errors[0].kind, ErrorKind::SourceUnavailable);
    assert_eq!(report.errors[0].context["query"], json!({"id": 2}));
    assert!(matches!(
        report.discrepancies[0],
        Discrepancy::MissingCounterpart {
            reason: MissingReason::LookupFailed,
            ..
        }
    ));
    assert_eq!(report.status, RunStatus::Completed);
    // 1 + 2 attempts + 1
    assert_eq!(secondary.calls(), 4);
}

#[test]
fn test_transient_secondary_failure_recovered_by_retry() {
    let (p, s) = pair(&[1]);
    let mut primary = warehouse(p);
    let secondary = CountingDocumentStore::new(documents(s)).failing_first(1);

    let report = build_engine(&["id"], &["v"], ComparatorRegistry::new(), retrying(10, 1))
        .run(&mut primary, &secondary, &CancellationToken::new())
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(secondary.calls(), 2);
}

#[test]
fn test_fail_fast_propagates_secondary_error() {
    let (p, s) = pair(&[1, 2]);
    let mut primary = warehouse(p);
    let secondary = CountingDocumentStore::new(documents(s)).failing_for(&[1]);
    let options = EngineOptions {
        continue_on_error: false,
        ..fast_options(10)
    };

    let result = build_engine(&["id"], &["v"], ComparatorRegistry::new(), options)
        .run(&mut primary, &secondary, &CancellationToken::new());

    assert!(matches!(
        result,
        Err(ReconError::SourceUnavailable {
            source_kind: SourceKind::Secondary,
            ..
        })
    ));
}

#[test]
fn test_cli_fail_fast_on_unreadable_relation() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();
    std::fs::remove_file(&csv).unwrap();

    let err = runner.expect_failure(&["run", "--config", &config.to_string_lossy(), "--fail-fast", "--no-progress"]);
    assert!(matches!(err, ReconError::InvalidInput { .. }));
    assert!(fixture.reports().is_empty());
}

#[test]
fn test_malformed_document_export() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, _) = fixture.create_order_sources().unwrap();
    let docs = fixture.root().join("broken.ndjson");
    std::fs::write(&docs, "{\"id\": 1}\n{\"id\": \n").unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();

    let err = runner.expect_failure(&["run", "--config", &config.to_string_lossy(), "--no-progress"]);
    match err {
        ReconError::InvalidInput { message } => assert!(message.contains("line 2")),
        other => panic!("expected invalid input, got {}", other),
    }
}
