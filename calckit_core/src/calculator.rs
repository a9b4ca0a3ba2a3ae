//! Calculator instances: one per computation attempt.
//!
//! An instance holds typed input values shaped by its [`CalculatorType`],
//! validates them against the type's registered rules, and runs the
//! computation step. Outputs are returned, never stored on the instance.

use crate::definition::InputType;
use crate::dsl::CalculatorType;
use crate::history::CalculationRecord;
use crate::slug::Slug;
use crate::validation::{ValidationErrors, NOT_A_DATE, NOT_A_NUMBER};
use crate::value::{cast, Cast, FieldValue, Outputs};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle of one computation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalculatorState {
    /// Inputs may be set
    Constructed,
    /// Validity has been determined and the inputs are valid
    Validated,
    /// Output was produced
    Computed,
    /// Validation failed; no output was produced
    Rejected,
}

/// A calculator instance bound to one calculator type
#[derive(Clone, Debug)]
pub struct Calculator {
    kind: Arc<CalculatorType>,
    values: BTreeMap<String, FieldValue>,
    // Raw text that could not be cast to the declared type
    unparsed: BTreeMap<String, String>,
    errors: ValidationErrors,
    state: CalculatorState,
}

impl Calculator {
    pub fn new(kind: Arc<CalculatorType>) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
            unparsed: BTreeMap::new(),
            errors: ValidationErrors::new(),
            state: CalculatorState::Constructed,
        }
    }

    /// Build an instance and assign every given input
    ///
    /// Fails with [`Error::UnknownInput`] if a name is not a declared input.
    pub fn with_inputs<K, I>(kind: Arc<CalculatorType>, inputs: I) -> Result<Self>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut calculator = Self::new(kind);
        for (name, raw) in inputs {
            calculator.set(name.as_ref(), raw)?;
        }
        Ok(calculator)
    }

    /// Build an instance from a flat mapping, keeping only declared inputs
    pub fn from_params<K, I>(kind: Arc<CalculatorType>, params: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut calculator = Self::new(kind);
        calculator.assign_permitted(params);
        calculator
    }

    /// Assign declared inputs from a flat mapping; undeclared keys are dropped
    pub fn assign_permitted<K, I>(&mut self, params: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (name, raw) in params {
            let name = name.as_ref();
            if self.kind.input_for(name).is_none() {
                tracing::debug!("Dropping undeclared input {}", name);
                continue;
            }
            // Declared, so assignment cannot fail.
            let _ = self.set(name, raw);
        }
    }

    /// Assign a raw value to a declared input, casting it to the input's type
    pub fn set(&mut self, name: &str, raw: impl Into<Value>) -> Result<()> {
        let input_type = self
            .kind
            .input_for(name)
            .map(|input| input.input_type())
            .ok_or_else(|| Error::UnknownInput(name.to_string()))?;

        self.unparsed.remove(name);
        match cast(input_type.storage_type(), &raw.into()) {
            Cast::Blank => {
                self.values.remove(name);
            }
            Cast::Value(value) => {
                self.values.insert(name.to_string(), value);
            }
            Cast::Invalid(text) => {
                self.values.remove(name);
                self.unparsed.insert(name.to_string(), text);
            }
        }
        self.state = CalculatorState::Constructed;
        Ok(())
    }

    /// Clear a declared input
    pub fn unset(&mut self, name: &str) -> Result<()> {
        self.set(name, Value::Null)
    }

    pub fn kind(&self) -> &Arc<CalculatorType> {
        &self.kind
    }

    pub fn state(&self) -> CalculatorState {
        self.state
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Current value of an input, if set
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Snapshot of every declared input and its current value
    pub fn input_values(&self) -> BTreeMap<String, Option<FieldValue>> {
        self.kind
            .inputs()
            .iter()
            .map(|input| (input.name().to_string(), self.values.get(input.name()).cloned()))
            .collect()
    }

    /// Run every registered rule from scratch; true when the inputs are valid
    pub fn validate(&mut self) -> bool {
        self.errors.clear();

        for name in self.unparsed.keys() {
            let message = match self.kind.input_for(name).map(|i| i.input_type()) {
                Some(InputType::Date) => NOT_A_DATE,
                _ => NOT_A_NUMBER,
            };
            self.errors.add(name.clone(), message);
        }

        for rule in self.kind.rules() {
            if self.unparsed.contains_key(rule.field()) {
                continue;
            }
            if let Some(message) = rule.check(self.values.get(rule.field())) {
                self.errors.add(rule.field(), message);
            }
        }

        let valid = self.errors.is_empty();
        self.state = if valid {
            CalculatorState::Validated
        } else {
            CalculatorState::Rejected
        };
        valid
    }

    /// Validate, then compute; `Ok(None)` when the inputs are invalid
    pub fn run(&mut self) -> Result<Option<Outputs>> {
        if !self.validate() {
            tracing::debug!(
                "Rejected {} with {} error(s)",
                self.kind.display_name(),
                self.errors.len()
            );
            return Ok(None);
        }
        let outputs = self.calculate()?;
        self.state = CalculatorState::Computed;
        Ok(Some(outputs))
    }

    /// Like [`run`](Self::run), but invalid inputs are an [`Error::Validation`]
    pub fn run_strict(&mut self) -> Result<Outputs> {
        match self.run()? {
            Some(outputs) => Ok(outputs),
            None => Err(Error::Validation(self.errors.clone())),
        }
    }

    /// Invoke the computation step directly, without validating
    pub fn calculate(&self) -> Result<Outputs> {
        match self.kind.compute_fn() {
            Some(compute) => compute(self),
            None => Err(Error::NotImplemented(self.kind.display_name())),
        }
    }

    pub fn calculator_name(&self) -> Option<&str> {
        self.kind.name()
    }

    pub fn calculator_slug(&self) -> Option<&Slug> {
        self.kind.slug()
    }

    pub fn version(&self) -> Option<&str> {
        self.kind.version()
    }

    /// Persistable snapshot of this instance's inputs and the given outputs
    pub fn to_record(&self, outputs: &Outputs, scope: Option<&str>) -> Result<CalculationRecord> {
        let slug = self.kind.slug().ok_or_else(|| {
            Error::Config(format!(
                "{} has no slug and cannot be recorded",
                self.kind.display_name()
            ))
        })?;

        // Every declared input, `null` when unset
        let inputs = self
            .input_values()
            .into_iter()
            .map(|(name, value)| (name, value.map_or(Value::Null, |v| v.to_json())))
            .collect();

        Ok(CalculationRecord::new(
            slug.as_str(),
            self.kind.version().unwrap_or_default(),
            inputs,
            outputs.clone(),
            scope.map(str::to_string),
        ))
    }

    // ------------------------------------------------------------------------
    // Typed readers for computation steps
    // ------------------------------------------------------------------------

    fn require(&self, name: &str) -> Result<&FieldValue> {
        self.values
            .get(name)
            .ok_or_else(|| Error::Calculation(format!("input '{}' has no value", name)))
    }

    fn mismatch(name: &str, expected: &str) -> Error {
        Error::Calculation(format!("input '{}' is not {}", name, expected))
    }

    /// Numeric input as `f64`; integers widen
    pub fn decimal(&self, name: &str) -> Result<f64> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| Self::mismatch(name, "a number"))
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            FieldValue::Integer(i) => Ok(*i),
            _ => Err(Self::mismatch(name, "an integer")),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| Self::mismatch(name, "text"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            FieldValue::Boolean(b) => Ok(*b),
            _ => Err(Self::mismatch(name, "a boolean")),
        }
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        match self.require(name)? {
            FieldValue::Date(d) => Ok(*d),
            _ => Err(Self::mismatch(name, "a date")),
        }
    }
}
