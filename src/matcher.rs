//! Counterpart resolution by key fields

use crate::model::{ErrorEntry, ErrorKind, MissingReason, SourceKind};
use crate::retry::RetryPolicy;
use crate::sources::{KeyQuery, SecondarySource};
use crate::value::Record;
use serde::{Deserialize, Serialize};

/// What to do when a key resolves to more than one secondary record.
///
/// Either way the first candidate returned is used as the counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first candidate silently
    FirstMatch,
    /// Use the first candidate and record a `match_ambiguous` error entry
    #[default]
    Flag,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Record),
    NotFound,
    /// A key field was absent or null; the store was not queried
    IncompleteKey,
    /// The store could not be queried after all retries
    Failed,
}

/// Result of resolving one primary record
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub lookup: Lookup,
    pub errors: Vec<ErrorEntry>,
}

impl MatchResult {
    fn new(lookup: Lookup) -> Self {
        Self {
            lookup,
            errors: Vec::new(),
        }
    }

    pub fn counterpart(&self) -> Option<&Record> {
        match &self.lookup {
            Lookup::Found(record) => Some(record),
            _ => None,
        }
    }

    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self.lookup {
            Lookup::Found(_) => None,
            Lookup::NotFound => Some(MissingReason::NotFound),
            Lookup::IncompleteKey => Some(MissingReason::IncompleteKey),
            Lookup::Failed => Some(MissingReason::LookupFailed),
        }
    }

    /// True when the secondary store was unreachable for this record
    pub fn is_failure(&self) -> bool {
        matches!(self.lookup, Lookup::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct RecordMatcher {
    key_fields: Vec<String>,
    batch_size: usize,
    ambiguity: AmbiguityPolicy,
    retry: RetryPolicy,
}

impl RecordMatcher {
    /// `batch_size` bounds the candidates fetched per lookup. At least two
    /// are always requested so a duplicated key stays detectable.
    pub fn new(key_fields: Vec<String>, batch_size: usize) -> Self {
        Self {
            key_fields,
            batch_size: batch_size.max(2),
            ambiguity: AmbiguityPolicy::default(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Project the key fields out of a primary record.
    ///
    /// `None` when any key field is absent or null.
    pub fn build_key(&self, primary: &Record) -> Option<KeyQuery> {
        let mut key = KeyQuery::new();
        for field in &self.key_fields {
            match primary.get(field) {
                Some(value) if !value.is_absent() => {
                    key.insert(field.clone(), value.clone());
                }
                _ => return None,
            }
        }
        Some(key)
    }

    pub fn find_counterpart<S>(&self, primary: &Record, source: &S) -> MatchResult
    where
        S: SecondarySource + ?Sized,
    {
        let key = match self.build_key(primary) {
            Some(key) => key,
            None => {
                log::debug!("Skipping lookup: incomplete key on record {:?}", primary);
                return MatchResult::new(Lookup::IncompleteKey);
            }
        };

        let what = format!("lookup on {}", source.name());
        let (result, attempts) = self.retry.run(&what, || source.find_by_key(&key, self.batch_size));
        let query = serde_json::to_value(&key).unwrap_or(serde_json::Value::Null);

        let mut candidates = match result {
            Ok(candidates) => candidates,
            Err(e) => {
                log::error!("Error fetching data from {}: {}", source.name(), e);
                let mut result = MatchResult::new(Lookup::Failed);
                result.errors.push(
                    ErrorEntry::new(
                        SourceKind::Secondary,
                        source.name(),
                        ErrorKind::SourceUnavailable,
                        e.to_string(),
                    )
                    .with_context("query", query)
                    .with_context("attempts", attempts),
                );
                return result;
            }
        };

        if candidates.is_empty() {
            return MatchResult::new(Lookup::NotFound);
        }

        let candidate_count = candidates.len();
        let first = candidates.swap_remove(0);
        let mut result = MatchResult::new(Lookup::Found(first));

        if candidate_count > 1 {
            match self.ambiguity {
                AmbiguityPolicy::FirstMatch => {
                    log::debug!("{} candidates for key {}, using the first", candidate_count, query);
                }
                AmbiguityPolicy::Flag => {
                    log::warn!("{} candidates for key {}, using the first", candidate_count, query);
                    result.errors.push(
                        ErrorEntry::new(
                            SourceKind::Secondary,
                            source.name(),
                            ErrorKind::MatchAmbiguous,
                            format!("{} records share this key; the first was used", candidate_count),
                        )
                        .with_context("query", query)
                        .with_context("candidates", candidate_count),
                    );
                }
            }
        }

        result
    }
}
