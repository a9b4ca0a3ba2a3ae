//! Display formatting for output values.

use crate::definition::OutputDefinition;
use crate::value::{FieldValue, DATE_FORMAT};
use chrono::NaiveDate;

const LONG_DATE: &str = "%B %-d, %Y";

/// Format an output value according to a type tag
///
/// Recognized tags: `date`, `decimal`, `integer`, `currency`, `percentage`.
/// Anything else is rendered as plain text.
pub fn format_output(value: Option<&FieldValue>, type_tag: &str) -> String {
    let value = match value {
        Some(value) => value,
        None => return String::new(),
    };

    match type_tag {
        "date" => match value {
            FieldValue::Date(date) => date.format(LONG_DATE).to_string(),
            FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(|date| date.format(LONG_DATE).to_string())
                .unwrap_or_else(|_| s.clone()),
            other => other.to_string(),
        },
        "decimal" => format!("{:.2}", numeric(value)),
        "integer" => format!("{}", numeric(value).trunc() as i64),
        "currency" => {
            let amount = numeric(value);
            if amount < 0.0 {
                format!("-${:.2}", amount.abs())
            } else {
                format!("${:.2}", amount)
            }
        }
        "percentage" => format!("{:.1}%", numeric(value)),
        _ => value.to_string(),
    }
}

/// Format a value for one declared output, preferring its `format` option
pub fn format_for(output: &OutputDefinition, value: Option<&FieldValue>) -> String {
    format_output(value, output.format().unwrap_or(output.output_type()))
}

// Non-numeric values format as zero.
fn numeric(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        FieldValue::Boolean(b) => f64::from(u8::from(*b)),
        other => other.as_f64().unwrap_or(0.0),
    }
}
