//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for a reconciliation run
#[derive(Debug)]
pub struct ProgressReporter {
    pub run_pb: Option<ProgressBar>,
    start_time: std::time::Instant,
}

impl ProgressReporter {
    /// Create progress reporter with a spinner for page/record counts
    pub fn new_for_run() -> Self {
        Self {
            run_pb: Some(create_spinner("Reconciling...")),
            start_time: std::time::Instant::now(),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            run_pb: None,
            start_time: std::time::Instant::now(),
        }
    }

    /// Update counts after a page has been folded into the result
    pub fn update(&self, pages: u64, records: u64, discrepancies: usize) {
        if let Some(pb) = &self.run_pb {
            pb.set_message(format!(
                "Reconciling... {} pages, {} records, {} discrepancies ({:.1}s)",
                pages,
                records,
                discrepancies,
                self.start_time.elapsed().as_secs_f64()
            ));
            pb.tick();
        }
    }

    pub fn finish(&self, message: &str) {
        if let Some(pb) = &self.run_pb {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.run_pb.take() {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
