//! Field-by-field classification of a primary record against its counterpart

use crate::comparator::ComparatorRegistry;
use crate::model::FieldDiff;
use crate::value::{field_value, Record};

/// Classification of one primary record
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Match,
    MissingCounterpart,
    FieldMismatch(Vec<FieldDiff>),
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match)
    }
}

/// Compare every configured field, in order, without stopping at the first
/// difference. A comparator fault counts as a difference for that field only.
pub fn classify(
    primary: &Record,
    counterpart: Option<&Record>,
    compare_fields: &[String],
    registry: &ComparatorRegistry,
) -> Outcome {
    let secondary = match counterpart {
        Some(record) => record,
        None => return Outcome::MissingCounterpart,
    };

    let mut diffs = Vec::new();
    for field in compare_fields {
        let primary_value = field_value(primary, field);
        let secondary_value = field_value(secondary, field);
        let comparator = registry.resolve(field);

        let (equal, fault) = match comparator.compare(&primary_value, &secondary_value) {
            Ok(equal) => (equal, None),
            Err(fault) => {
                log::debug!("Comparator fault on field '{}': {}", field, fault);
                (false, Some(fault.to_string()))
            }
        };

        if !equal {
            diffs.push(FieldDiff {
                field: field.clone(),
                primary_value,
                secondary_value,
                fault,
            });
        }
    }

    if diffs.is_empty() {
        Outcome::Match
    } else {
        Outcome::FieldMismatch(diffs)
    }
}
