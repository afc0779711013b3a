//! Per-field comparison rules and the registry that resolves them

use crate::error::{ComparatorFault, ReconError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A pure equality predicate over two field values.
///
/// Returning `Err` means the rule could not evaluate the pair; callers treat
/// that as "not equal" for the field in question.
pub trait Comparator: fmt::Debug + Send + Sync {
    /// Human-readable rule name, used in reports and `check` output
    fn name(&self) -> String;

    fn compare(&self, primary: &Value, secondary: &Value) -> std::result::Result<bool, ComparatorFault>;
}

/// Built-in comparison rules, configurable per field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ComparatorRule {
    /// Structural equality, including type
    Strict,
    /// `|a - b| < tolerance` over numbers
    NumericTolerance { tolerance: f64 },
    /// `|a - b| < seconds` over timestamps or epoch numbers
    TimestampTolerance { seconds: f64 },
    CaseInsensitive,
    /// Arrays holding the same elements, ignoring order and duplicates
    UnorderedSet,
    /// Every key of the primary object that the secondary also has must be equal
    SubsetMatch,
}

impl ComparatorRule {
    /// Reject parameters that could never produce a meaningful comparison
    pub fn validate(&self, field: &str) -> Result<()> {
        match self {
            ComparatorRule::NumericTolerance { tolerance } => {
                if !tolerance.is_finite() || *tolerance <= 0.0 {
                    return Err(ReconError::config(format!(
                        "comparison rule for '{}': tolerance must be a positive number, got {}",
                        field, tolerance
                    )));
                }
            }
            ComparatorRule::TimestampTolerance { seconds } => {
                if !seconds.is_finite() || *seconds <= 0.0 {
                    return Err(ReconError::config(format!(
                        "comparison rule for '{}': seconds must be a positive number, got {}",
                        field, seconds
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn fault(&self, primary: &Value, secondary: &Value) -> ComparatorFault {
        ComparatorFault::new(
            self.name(),
            format!(
                "cannot compare {} with {}",
                primary.type_name(),
                secondary.type_name()
            ),
        )
    }
}

impl Comparator for ComparatorRule {
    fn name(&self) -> String {
        match self {
            ComparatorRule::Strict => "strict".to_string(),
            ComparatorRule::NumericTolerance { tolerance } => format!("numeric_tolerance({})", tolerance),
            ComparatorRule::TimestampTolerance { seconds } => format!("timestamp_tolerance({}s)", seconds),
            ComparatorRule::CaseInsensitive => "case_insensitive".to_string(),
            ComparatorRule::UnorderedSet => "unordered_set".to_string(),
            ComparatorRule::SubsetMatch => "subset_match".to_string(),
        }
    }

    fn compare(&self, primary: &Value, secondary: &Value) -> std::result::Result<bool, ComparatorFault> {
        if primary == secondary {
            return Ok(true);
        }
        if let ComparatorRule::Strict = self {
            return Ok(false);
        }
        // A value on one side only is a difference, not a fault
        if primary.is_absent() || secondary.is_absent() {
            return Ok(false);
        }

        match self {
            ComparatorRule::Strict => Ok(false),
            ComparatorRule::NumericTolerance { tolerance } => {
                match (primary.as_f64(), secondary.as_f64()) {
                    (Some(a), Some(b)) => Ok((a - b).abs() < *tolerance),
                    _ => Err(self.fault(primary, secondary)),
                }
            }
            ComparatorRule::TimestampTolerance { seconds } => {
                match (primary.as_epoch_seconds(), secondary.as_epoch_seconds()) {
                    (Some(a), Some(b)) => Ok((a - b).abs() < *seconds),
                    _ => Err(self.fault(primary, secondary)),
                }
            }
            ComparatorRule::CaseInsensitive => match (primary.as_str(), secondary.as_str()) {
                (Some(a), Some(b)) => Ok(a.to_lowercase() == b.to_lowercase()),
                _ => Err(self.fault(primary, secondary)),
            },
            ComparatorRule::UnorderedSet => match (primary, secondary) {
                (Value::Array(a), Value::Array(b)) => {
                    Ok(a.iter().all(|x| b.contains(x)) && b.iter().all(|y| a.contains(y)))
                }
                _ => Err(self.fault(primary, secondary)),
            },
            ComparatorRule::SubsetMatch => match (primary, secondary) {
                (Value::Object(a), Value::Object(b)) => Ok(a
                    .iter()
                    .filter_map(|(key, value)| b.get(key).map(|other| (value, other)))
                    .all(|(value, other)| value == other)),
                _ => Err(self.fault(primary, secondary)),
            },
        }
    }
}

/// Field name to comparator lookup, fixed once constructed
#[derive(Debug, Clone)]
pub struct ComparatorRegistry {
    default: Arc<dyn Comparator>,
    rules: IndexMap<String, Arc<dyn Comparator>>,
}

impl ComparatorRegistry {
    /// Registry with no overrides: every field uses strict equality
    pub fn new() -> Self {
        Self {
            default: Arc::new(ComparatorRule::Strict),
            rules: IndexMap::new(),
        }
    }

    /// Build from configured rules, validating each one
    pub fn from_rules(rules: &IndexMap<String, ComparatorRule>) -> Result<Self> {
        let mut registry = Self::new();
        for (field, rule) in rules {
            rule.validate(field)?;
            registry = registry.with_rule(field.clone(), rule.clone());
        }
        Ok(registry)
    }

    /// Register a rule for a field, replacing any earlier one
    pub fn with_rule(mut self, field: impl Into<String>, rule: impl Comparator + 'static) -> Self {
        self.rules.insert(field.into(), Arc::new(rule));
        self
    }

    /// The rule registered for `field`, or strict equality
    pub fn resolve(&self, field: &str) -> &dyn Comparator {
        self.rules
            .get(field)
            .map(|rule| rule.as_ref())
            .unwrap_or_else(|| self.default.as_ref())
    }

    pub fn has_rule(&self, field: &str) -> bool {
        self.rules.contains_key(field)
    }

    /// Field name to rule name, for every override
    pub fn describe(&self) -> BTreeMap<String, String> {
        self.rules
            .iter()
            .map(|(field, rule)| (field.clone(), rule.name()))
            .collect()
    }
}

impl Default for ComparatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for ComparatorRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.describe().serialize(serializer)
    }
}
