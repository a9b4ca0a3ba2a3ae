//! Validation rules registered by input declarations, and the per-field
//! error collection they populate.

use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A validation rule attached to one input
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// Value must be set and non-blank
    Presence { field: String },
    /// Value must be >= bound; skipped when unset
    Min { field: String, bound: f64 },
    /// Value must be <= bound; skipped when unset
    Max { field: String, bound: f64 },
}

impl Rule {
    pub fn field(&self) -> &str {
        match self {
            Rule::Presence { field } | Rule::Min { field, .. } | Rule::Max { field, .. } => field,
        }
    }

    /// Check one value, returning the error message on failure
    pub fn check(&self, value: Option<&FieldValue>) -> Option<String> {
        match self {
            // `false` does not satisfy presence; a required boolean must be checked.
            Rule::Presence { .. } => match value {
                Some(v) if !v.is_blank() && *v != FieldValue::Boolean(false) => None,
                _ => Some("can't be blank".to_string()),
            },
            Rule::Min { bound, .. } => match check_bound(value, |n| n >= *bound) {
                BoundCheck::Outside => Some(format!(
                    "must be greater than or equal to {}",
                    format_bound(*bound)
                )),
                BoundCheck::NotANumber => Some(NOT_A_NUMBER.to_string()),
                BoundCheck::Skipped | BoundCheck::Within => None,
            },
            Rule::Max { bound, .. } => match check_bound(value, |n| n <= *bound) {
                BoundCheck::Outside => Some(format!(
                    "must be less than or equal to {}",
                    format_bound(*bound)
                )),
                BoundCheck::NotANumber => Some(NOT_A_NUMBER.to_string()),
                BoundCheck::Skipped | BoundCheck::Within => None,
            },
        }
    }
}

enum BoundCheck {
    Skipped,
    Within,
    Outside,
    NotANumber,
}

fn check_bound(value: Option<&FieldValue>, within: impl Fn(f64) -> bool) -> BoundCheck {
    let value = match value {
        Some(v) if !v.is_blank() => v,
        _ => return BoundCheck::Skipped,
    };
    let number = match value {
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    };
    match number {
        Some(n) if within(n) => BoundCheck::Within,
        Some(_) => BoundCheck::Outside,
        None => BoundCheck::NotANumber,
    }
}

pub(crate) const NOT_A_NUMBER: &str = "is not a number";
pub(crate) const NOT_A_DATE: &str = "is not a valid date";

/// Render a bound without a trailing `.0` when it is integral
pub fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        format!("{}", bound)
    }
}

/// Per-field validation messages, in the order they were added
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Messages for one field; empty when the field is valid
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// "Label message" strings, using `label_for` to render field names
    pub fn full_messages_with(&self, label_for: impl Fn(&str) -> String) -> Vec<String> {
        self.iter()
            .flat_map(|(field, messages)| {
                let label = label_for(field);
                messages
                    .iter()
                    .map(move |message| format!("{} {}", label, message))
            })
            .collect()
    }

    /// "Label message" strings using humanized field names
    pub fn full_messages(&self) -> Vec<String> {
        self.full_messages_with(crate::definition::humanize)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}
