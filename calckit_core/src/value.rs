//! Typed input and output values.
//!
//! Raw values arrive as `serde_json::Value` (bound from a request or read back
//! from a stored calculation record) and are cast into a [`FieldValue`] using
//! the declared [`InputType`] of the field they are assigned to.

use crate::definition::InputType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Date format accepted for `date` inputs
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const FALSE_VALUES: &[&str] = &["false", "0", "f", "off", "no"];

/// A typed input or output value
///
/// Stored strings deserialize as `Text`; dates are recovered by casting
/// against a declared type or by the `date` display format.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
}

/// Output mapping produced by a computation step, keyed by output name
pub type Outputs = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// Numeric view of the value; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Blank values count as absent for presence checks
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }

    /// Plain JSON rendering, as stored in calculation records
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Decimal(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::Text(s) => Value::String(s.clone()),
        }
    }
}

// Decimals compare bitwise so values can serve as map keys inside definitions.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Boolean(b) => b.hash(state),
            FieldValue::Integer(i) => i.hash(state),
            FieldValue::Decimal(d) => d.to_bits().hash(state),
            FieldValue::Date(d) => d.hash(state),
            FieldValue::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Outcome of casting a raw value into a declared input slot
#[derive(Clone, Debug, PartialEq)]
pub enum Cast {
    /// Null or blank input; the slot is left unset
    Blank,
    /// Successfully typed value
    Value(FieldValue),
    /// Input that could not be read as the declared type
    Invalid(String),
}

/// Cast a raw value to the given input type
pub fn cast(input_type: InputType, raw: &Value) -> Cast {
    if raw.is_null() {
        return Cast::Blank;
    }
    if let Value::String(s) = raw {
        if s.trim().is_empty() {
            return Cast::Blank;
        }
    }

    match input_type {
        InputType::String | InputType::Select => Cast::Value(FieldValue::Text(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        InputType::Integer => match raw {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cast::Value(FieldValue::Integer(i)),
                None => match n.as_f64() {
                    Some(f) if f.is_finite() => Cast::Value(FieldValue::Integer(f.trunc() as i64)),
                    _ => Cast::Invalid(n.to_string()),
                },
            },
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Cast::Value(FieldValue::Integer(i))
                } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
                    Cast::Value(FieldValue::Integer(f.trunc() as i64))
                } else {
                    Cast::Invalid(s.clone())
                }
            }
            other => Cast::Invalid(other.to_string()),
        },
        InputType::Decimal => match raw {
            Value::Number(n) => n
                .as_f64()
                .map(|f| Cast::Value(FieldValue::Decimal(f)))
                .unwrap_or_else(|| Cast::Invalid(n.to_string())),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Cast::Value(FieldValue::Decimal(f)),
                _ => Cast::Invalid(s.clone()),
            },
            other => Cast::Invalid(other.to_string()),
        },
        InputType::Date => match raw {
            Value::String(s) => match NaiveDate::parse_from_str(s.trim(), DATE_FORMAT) {
                Ok(d) => Cast::Value(FieldValue::Date(d)),
                Err(_) => Cast::Invalid(s.clone()),
            },
            other => Cast::Invalid(other.to_string()),
        },
        InputType::Boolean => match raw {
            Value::Bool(b) => Cast::Value(FieldValue::Boolean(*b)),
            Value::Number(n) => Cast::Value(FieldValue::Boolean(n.as_f64() != Some(0.0))),
            Value::String(s) => {
                let lowered = s.trim().to_lowercase();
                Cast::Value(FieldValue::Boolean(
                    !FALSE_VALUES.contains(&lowered.as_str()),
                ))
            }
            other => Cast::Invalid(other.to_string()),
        },
    }
}
