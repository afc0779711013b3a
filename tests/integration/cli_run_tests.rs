//! Integration tests for the init, check, run and show commands

use crate::common::CliTestRunner;
use recon_audit::commands::{run_command, RunOverrides};
use recon_audit::error::ReconError;
use recon_audit::model::{Discrepancy, MissingReason, RunStatus};
use recon_audit::output::load_report;
use recon_audit::ReconConfig;
use serde_json::json;

#[test]
fn test_init_writes_loadable_template() {
    let runner = CliTestRunner::new().unwrap();
    let path = runner.fixture().root().join("conf/recon.json");
    let path_arg = path.to_string_lossy().to_string();

    runner.expect_success(&["init", "--path", &path_arg]);

    let content = std::fs::read_to_string(&path).unwrap();
    let config: ReconConfig = serde_json::from_str(&content).unwrap();
    assert_eq!(config, ReconConfig::template());
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let runner = CliTestRunner::new().unwrap();
    let path = runner.fixture().root().join("recon.json");
    let path_arg = path.to_string_lossy().to_string();
    std::fs::write(&path, "{\"custom\": true}").unwrap();

    let err = runner.expect_failure(&["init", "--path", &path_arg]);
    assert!(matches!(err, ReconError::Config { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"custom\": true}");

    runner.expect_success(&["init", "--path", &path_arg, "--force"]);
    assert!(std::fs::read_to_string(&path).unwrap().contains("key_fields"));
}

#[test]
fn test_check_valid_config() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();

    runner.expect_success(&["check", "--config", &config.to_string_lossy()]);
    assert!(fixture.reports().is_empty());
}

#[test]
fn test_check_rejects_invalid_config() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture
        .create_config(
            "recon.json",
            &csv,
            &docs,
            json!({"reconciliation": {"compare_fields": []}}),
        )
        .unwrap();

    let err = runner.expect_failure(&["check", "--config", &config.to_string_lossy()]);
    assert!(matches!(err, ReconError::Config { .. }));
}

#[test]
fn test_run_writes_report() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();

    runner.expect_success(&["run", "--config", &config.to_string_lossy(), "--no-progress"]);

    let reports = fixture.reports();
    assert_eq!(reports.len(), 1);
    let name = reports[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("reconciliation_report_"));

    let report = load_report(&reports[0]).unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.summary.total_records, 4);
    // id 1 matches under the tolerance and case rules, id 3 matches exactly
    assert_eq!(report.summary.matching_records, 2);
    assert_eq!(report.summary.discrepancy_count, 2);
    assert!(report.errors.is_empty());

    match &report.discrepancies[0] {
        Discrepancy::FieldMismatch { field_diffs, .. } => {
            assert_eq!(field_diffs.len(), 1);
            assert_eq!(field_diffs[0].field, "price");
        }
        other => panic!("expected a field mismatch for id 2, got {:?}", other),
    }
    assert!(matches!(
        report.discrepancies[1],
        Discrepancy::MissingCounterpart { reason: MissingReason::NotFound, .. }
    ));
}

#[test]
fn test_run_resolves_relative_paths_against_config_dir() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let relative = json!({
        "warehouse": {"relation": "'orders.csv'"},
        "document_store": {"path": "orders.ndjson"},
        "reconciliation": {"output_dir": "results"}
    });
    let config = fixture.create_config("recon.json", &csv, &docs, relative).unwrap();

    let path = run_command(&config, &RunOverrides::default(), false, false).unwrap();

    assert!(path.starts_with(fixture.root().join("results")));
    let report = load_report(&path).unwrap();
    assert_eq!(report.summary.total_records, 4);
    assert_eq!(report.summary.matching_records, 2);
}

#[test]
fn test_run_overrides_output_dir_and_batch_size() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();
    let out = fixture.root().join("elsewhere");

    let overrides = RunOverrides {
        output_dir: Some(out.clone()),
        batch_size: Some(1),
        parallel: true,
        ..Default::default()
    };
    let path = run_command(&config, &overrides, false, false).unwrap();

    assert!(path.starts_with(&out));
    assert!(fixture.reports().is_empty());
    assert_eq!(load_report(&path).unwrap().summary.total_records, 4);
}

#[test]
fn test_run_uses_configured_indent() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture
        .create_config("recon.json", &csv, &docs, json!({"output": {"json_indent": 4}}))
        .unwrap();

    let path = run_command(&config, &RunOverrides::default(), false, false).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.contains("\n    \"run_id\""));
}

#[test]
fn test_run_with_missing_document_export_fails() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, _) = fixture.create_order_sources().unwrap();
    let config = fixture
        .create_config("recon.json", &csv, &fixture.root().join("absent.ndjson"), json!({}))
        .unwrap();

    let err = runner.expect_failure(&["run", "--config", &config.to_string_lossy(), "--no-progress"]);
    assert!(matches!(err, ReconError::Config { .. }));
    assert!(fixture.reports().is_empty());
}

#[test]
fn test_show_report_formats() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (csv, docs) = fixture.create_order_sources().unwrap();
    let config = fixture.create_config("recon.json", &csv, &docs, json!({})).unwrap();
    let path = run_command(&config, &RunOverrides::default(), false, false).unwrap();
    let path_arg = path.to_string_lossy().to_string();

    runner.expect_success(&["show", &path_arg]);
    runner.expect_success(&["show", &path_arg, "--format", "json"]);
    let err = runner.expect_failure(&["show", &path_arg, "--format", "xml"]);
    assert!(matches!(err, ReconError::InvalidInput { .. }));
}

#[test]
fn test_show_missing_report() {
    let runner = CliTestRunner::new().unwrap();
    let missing = runner.fixture().root().join("nope.json");
    let err = runner.expect_failure(&["show", &missing.to_string_lossy()]);
    assert!(matches!(err, ReconError::InvalidInput { .. }));
}
