//! Logging setup: console, plus an optional per-run log file

use crate::error::Result;
use chrono::{DateTime, Utc};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes every log line to stderr and to the run log file
pub struct TeeWriter {
    file: File,
}

impl TeeWriter {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

pub fn log_file_name(started_at: DateTime<Utc>) -> String {
    format!("reconciliation_{}.log", started_at.format("%Y%m%d_%H%M%S"))
}

/// Create `dir` if needed and open a fresh run log inside it
pub fn open_log_file(dir: &Path, started_at: DateTime<Utc>) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(started_at));
    let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the global logger.
///
/// The level is `level`, then `RUST_LOG`, then debug when `verbose` is set.
/// Returns the log file path when `log_dir` is given.
pub fn init(level: LevelFilter, verbose: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }

    let log_path = match log_dir {
        Some(dir) => {
            let (path, file) = open_log_file(dir, Utc::now())?;
            builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(file))));
            Some(path)
        }
        None => None,
    };

    builder.init();
    if let Some(path) = &log_path {
        log::info!("Logging to {}", path.display());
    }
    Ok(log_path)
}
