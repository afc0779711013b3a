//! Error types for reconciliation runs

use crate::model::SourceKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{source_kind} source unavailable: {message}")]
    SourceUnavailable {
        source_kind: SourceKind,
        message: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl ReconError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn source_unavailable(source_kind: SourceKind, msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_kind,
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}

/// A comparator rule could not evaluate the values it was given
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rule}: {message}")]
pub struct ComparatorFault {
    pub rule: String,
    pub message: String,
}

impl ComparatorFault {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
