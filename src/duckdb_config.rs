//! DuckDB runtime discovery and a startup probe

use crate::error::{ReconError, Result};
use duckdb::Connection;
use std::env;
use std::path::{Path, PathBuf};

/// How the DuckDB engine reached this binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMode {
    /// Compiled in through the `bundled` feature
    Bundled,
    /// A system library, when one could be located
    System(Option<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct DuckDbRuntime {
    pub link_mode: LinkMode,
    /// Version reported by the engine itself
    pub version: String,
}

impl LinkMode {
    pub fn detect() -> Self {
        if cfg!(feature = "bundled") && env::var("DUCKDB_DISABLE_BUNDLED").is_err() {
            LinkMode::Bundled
        } else {
            LinkMode::System(discover_library_path())
        }
    }
}

/// Locate a system `libduckdb`, honouring `DUCKDB_LIB_PATH` first
pub fn discover_library_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("DUCKDB_LIB_PATH") {
        let path = PathBuf::from(path);
        if has_duckdb_library(&path) {
            return Some(path);
        }
    }
    standard_paths().into_iter().find(|p| has_duckdb_library(p))
}

fn standard_paths() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "macos") {
        &["/opt/homebrew/lib", "/usr/local/lib", "/opt/local/lib"]
    } else if cfg!(target_os = "windows") {
        &["C:\\Program Files\\DuckDB\\lib", "C:\\duckdb\\lib"]
    } else {
        &["/usr/lib", "/usr/local/lib", "/lib", "/usr/lib/x86_64-linux-gnu", "/usr/lib64"]
    };
    paths.iter().map(PathBuf::from).collect()
}

fn has_duckdb_library(dir: &Path) -> bool {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["duckdb.dll", "libduckdb.dll"]
    } else if cfg!(target_os = "macos") {
        &["libduckdb.dylib", "libduckdb.so"]
    } else {
        &["libduckdb.so", "libduckdb.so.1"]
    };
    dir.exists() && names.iter().any(|name| dir.join(name).exists())
}

fn missing_runtime_message(cause: &duckdb::Error) -> String {
    let mut message = format!("DuckDB could not be started: {}\n\n", cause);
    message.push_str("Possible solutions:\n");
    if cfg!(target_os = "macos") {
        message.push_str("  1. Install DuckDB: brew install duckdb\n");
    } else if cfg!(target_os = "linux") {
        message.push_str("  1. Install DuckDB: sudo apt install libduckdb-dev\n");
    } else {
        message.push_str("  1. Download DuckDB from https://duckdb.org/docs/installation/\n");
    }
    message.push_str("  2. Point at a custom install: export DUCKDB_LIB_PATH=/path/to/duckdb/lib\n");
    message.push_str("  3. Rebuild with the bundled engine: cargo build --features bundled\n");
    message
}

/// Open a throwaway in-memory database so a broken install fails before any run starts
pub fn init_duckdb() -> Result<DuckDbRuntime> {
    let link_mode = LinkMode::detect();

    let connection =
        Connection::open_in_memory().map_err(|e| ReconError::config(missing_runtime_message(&e)))?;
    let version: String = connection
        .query_row("SELECT version()", [], |row| row.get(0))
        .map_err(|e| ReconError::config(missing_runtime_message(&e)))?;

    match &link_mode {
        LinkMode::Bundled => log::debug!("Using bundled DuckDB {}", version),
        LinkMode::System(Some(path)) => {
            log::debug!("Using DuckDB {} from {}", version, path.display())
        }
        LinkMode::System(None) => log::debug!("Using system DuckDB {}", version),
    }

    Ok(DuckDbRuntime { link_mode, version })
}
