//! Input and output field definitions.
//!
//! Definitions are immutable value objects created when a field is declared on
//! a calculator type. Equality and hashing are structural over
//! (name, type, options).

use crate::value::FieldValue;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Input types
// ============================================================================

/// The closed set of types an input may be declared with
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    String,
    Integer,
    Decimal,
    Date,
    Boolean,
    Select,
}

impl InputType {
    pub const ALL: [InputType; 6] = [
        InputType::String,
        InputType::Integer,
        InputType::Decimal,
        InputType::Date,
        InputType::Boolean,
        InputType::Select,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::String => "string",
            InputType::Integer => "integer",
            InputType::Decimal => "decimal",
            InputType::Date => "date",
            InputType::Boolean => "boolean",
            InputType::Select => "select",
        }
    }

    /// Storage type of the attribute slot; `select` is held as text
    pub fn storage_type(&self) -> InputType {
        match self {
            InputType::Select => InputType::String,
            other => *other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, InputType::Integer | InputType::Decimal)
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        InputType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = InputType::ALL.iter().map(|t| t.as_str()).collect();
                Error::Config(format!(
                    "Unknown input type: {:?}. Valid types: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Anything that names an input type, checked when the input is declared
pub trait IntoInputType {
    fn into_input_type(self) -> Result<InputType>;
}

impl IntoInputType for InputType {
    fn into_input_type(self) -> Result<InputType> {
        Ok(self)
    }
}

impl IntoInputType for &str {
    fn into_input_type(self) -> Result<InputType> {
        self.parse()
    }
}

impl IntoInputType for String {
    fn into_input_type(self) -> Result<InputType> {
        self.parse()
    }
}

// ============================================================================
// Defaults and select options
// ============================================================================

/// Zero-argument producer for defaults computed at the point of use
#[derive(Clone)]
pub struct Producer(Arc<dyn Fn() -> FieldValue + Send + Sync>);

impl Producer {
    pub fn new(f: impl Fn() -> FieldValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer({:p})", self.addr())
    }
}

// Producers compare by identity.
impl PartialEq for Producer {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for Producer {}

impl Hash for Producer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.addr() as usize).hash(state);
    }
}

/// Default value of an input: a literal, or a producer run on demand
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DefaultValue {
    Literal(FieldValue),
    Deferred(Producer),
}

impl DefaultValue {
    pub fn resolve(&self) -> FieldValue {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Deferred(producer) => (producer.0)(),
        }
    }
}

/// One (display, value) entry of a select input
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Recognized options for an input field
#[derive(Clone, Debug, Default)]
pub struct InputOptions {
    pub label: Option<String>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub default: Option<DefaultValue>,
    pub placeholder: Option<String>,
    pub hint: Option<String>,
    pub options: Option<Vec<SelectOption>>,
}

impl InputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with(mut self, f: impl Fn() -> FieldValue + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Deferred(Producer::new(f)));
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn select<L, V>(mut self, options: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        self.options = Some(
            options
                .into_iter()
                .map(|(label, value)| SelectOption::new(label, value))
                .collect(),
        );
        self
    }
}

fn bound_bits(bound: Option<f64>) -> Option<u64> {
    bound.map(f64::to_bits)
}

// Bounds compare bitwise, matching `FieldValue`.
impl PartialEq for InputOptions {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.required == other.required
            && bound_bits(self.min) == bound_bits(other.min)
            && bound_bits(self.max) == bound_bits(other.max)
            && bound_bits(self.step) == bound_bits(other.step)
            && self.default == other.default
            && self.placeholder == other.placeholder
            && self.hint == other.hint
            && self.options == other.options
    }
}

impl Eq for InputOptions {}

impl Hash for InputOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        self.required.hash(state);
        for bound in [self.min, self.max, self.step] {
            bound_bits(bound).hash(state);
        }
        self.default.hash(state);
        self.placeholder.hash(state);
        self.hint.hash(state);
        self.options.hash(state);
    }
}

/// Recognized options for an output field
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutputOptions {
    pub label: Option<String>,
    pub format: Option<String>,
}

impl OutputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Default label for a field: underscores become spaces, first letter upper-cased
pub fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Metadata for one declared input
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputDefinition {
    name: String,
    input_type: InputType,
    options: InputOptions,
}

impl InputDefinition {
    pub fn new(name: impl Into<String>, input_type: InputType, options: InputOptions) -> Self {
        Self {
            name: name.into(),
            input_type,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn options(&self) -> &InputOptions {
        &self.options
    }

    pub fn label(&self) -> String {
        self.options
            .label
            .clone()
            .unwrap_or_else(|| humanize(&self.name))
    }

    pub fn is_required(&self) -> bool {
        self.options.required
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.options.default.as_ref()
    }

    /// The default value, running the producer if it is deferred
    pub fn resolve_default(&self) -> Option<FieldValue> {
        self.options.default.as_ref().map(DefaultValue::resolve)
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.options.placeholder.as_deref()
    }

    pub fn min(&self) -> Option<f64> {
        self.options.min
    }

    pub fn max(&self) -> Option<f64> {
        self.options.max
    }

    pub fn step(&self) -> Option<f64> {
        self.options.step
    }

    pub fn options_for_select(&self) -> Option<&[SelectOption]> {
        self.options.options.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.options.hint.as_deref()
    }
}

/// Metadata for one declared output
///
/// The type tag is free-form and only drives display formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputDefinition {
    name: String,
    output_type: String,
    options: OutputOptions,
}

impl OutputDefinition {
    pub fn new(
        name: impl Into<String>,
        output_type: impl Into<String>,
        options: OutputOptions,
    ) -> Self {
        Self {
            name: name.into(),
            output_type: output_type.into(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_type(&self) -> &str {
        &self.output_type
    }

    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    pub fn label(&self) -> String {
        self.options
            .label
            .clone()
            .unwrap_or_else(|| humanize(&self.name))
    }

    pub fn format(&self) -> Option<&str> {
        self.options.format.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_label_defaults_to_humanized_name() {
        let input = InputDefinition::new("unit_price", InputType::Decimal, InputOptions::new());
        assert_eq!(input.label(), "Unit price");

        let output = OutputDefinition::new("total_due", "currency", OutputOptions::new());
        assert_eq!(output.label(), "Total due");
    }

    #[test]
    fn test_explicit_label_wins() {
        let input = InputDefinition::new(
            "unit_price",
            InputType::Decimal,
            InputOptions::new().label("Price per unit"),
        );
        assert_eq!(input.label(), "Price per unit");
    }

    #[test]
    fn test_accessors_read_options() {
        let input = InputDefinition::new(
            "frequency",
            InputType::Select,
            InputOptions::new()
                .required()
                .min(1.0)
                .max(12.0)
                .step(1.0)
                .placeholder("Pick one")
                .hint("How often")
                .select([("Monthly", "12"), ("Yearly", "1")]),
        );
        assert!(input.is_required());
        assert_eq!(input.min(), Some(1.0));
        assert_eq!(input.max(), Some(12.0));
        assert_eq!(input.step(), Some(1.0));
        assert_eq!(input.placeholder(), Some("Pick one"));
        assert_eq!(input.hint(), Some("How often"));
        let options = input.options_for_select().unwrap();
        assert_eq!(options[0], SelectOption::new("Monthly", "12"));
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_default_literal_and_deferred() {
        let literal = InputDefinition::new(
            "rate",
            InputType::Decimal,
            InputOptions::new().default_value(5.0),
        );
        assert_eq!(literal.resolve_default(), Some(FieldValue::Decimal(5.0)));

        let deferred = InputDefinition::new(
            "name",
            InputType::String,
            InputOptions::new().default_with(|| FieldValue::Text("computed".into())),
        );
        assert_eq!(
            deferred.resolve_default(),
            Some(FieldValue::Text("computed".into()))
        );

        let none = InputDefinition::new("x", InputType::Integer, InputOptions::new());
        assert!(none.resolve_default().is_none());
    }

    #[test]
    fn test_structural_equality_and_hashing() {
        let a = InputDefinition::new("value", InputType::Decimal, InputOptions::new().min(0.0));
        let b = InputDefinition::new("value", InputType::Decimal, InputOptions::new().min(0.0));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));

        let renamed = InputDefinition::new("other", InputType::Decimal, InputOptions::new().min(0.0));
        let retyped = InputDefinition::new("value", InputType::Integer, InputOptions::new().min(0.0));
        let reoptioned = InputDefinition::new("value", InputType::Decimal, InputOptions::new().min(1.0));
        assert_ne!(a, renamed);
        assert_ne!(a, retyped);
        assert_ne!(a, reoptioned);
        assert!(!set.contains(&reoptioned));
    }

    #[test]
    fn test_equal_definitions_hash_alike() {
        let zero = InputDefinition::new("value", InputType::Decimal, InputOptions::new().min(0.0));
        let neg_zero =
            InputDefinition::new("value", InputType::Decimal, InputOptions::new().min(-0.0));
        let mut set = HashSet::new();
        set.insert(zero.clone());
        assert_eq!(zero == neg_zero, set.contains(&neg_zero));

        let nan = InputDefinition::new("value", InputType::Decimal, InputOptions::new().max(f64::NAN));
        assert_eq!(nan, nan.clone());
        set.insert(nan.clone());
        assert!(set.contains(&nan));
    }

    #[test]
    fn test_output_equality() {
        let a = OutputDefinition::new("total", "currency", OutputOptions::new().format("currency"));
        let b = OutputDefinition::new("total", "currency", OutputOptions::new().format("currency"));
        let c = OutputDefinition::new("total", "decimal", OutputOptions::new().format("currency"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.format(), Some("currency"));
    }

    #[test]
    fn test_unknown_type_names_valid_set() {
        let err = "integr".parse::<InputType>().unwrap_err();
        assert!(err.is_config());
        let message = err.to_string();
        assert!(message.contains("integr"));
        assert!(message.contains("string, integer, decimal, date, boolean, select"));
    }

    #[test]
    fn test_select_stored_as_text() {
        assert_eq!(InputType::Select.storage_type(), InputType::String);
        assert_eq!(InputType::Date.storage_type(), InputType::Date);
    }
}
