//! Declaration builder for calculator types.
//!
//! A calculator type is declared once through [`CalculatorBuilder`] and is
//! immutable afterwards. Declaring an input also registers its validation
//! rules; malformed declarations fail at the call that makes them, before any
//! calculator instance exists.
//!
//! ```
//! use calckit_core::{CalculatorType, FieldValue, InputOptions, InputType, Outputs, OutputOptions};
//!
//! let doubler = CalculatorType::builder()
//!     .name("Doubler")
//!     .slug("doubler")
//!     .version("1.0")
//!     .input("value", InputType::Decimal, InputOptions::new().required().min(0.0))?
//!     .output("doubled", "decimal", OutputOptions::new())?
//!     .compute(|calc| {
//!         let value = calc.decimal("value")?;
//!         Ok(Outputs::from([("doubled".to_string(), FieldValue::Decimal(value * 2.0))]))
//!     })
//!     .build();
//!
//! assert_eq!(doubler.inputs().len(), 1);
//! # Ok::<(), calckit_core::Error>(())
//! ```

use crate::calculator::Calculator;
use crate::definition::{
    InputDefinition, InputOptions, IntoInputType, OutputDefinition, OutputOptions,
};
use crate::slug::Slug;
use crate::validation::Rule;
use crate::value::Outputs;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Computation step: a pure function of the calculator's current inputs
pub type ComputeFn = Arc<dyn Fn(&Calculator) -> Result<Outputs> + Send + Sync>;

/// Immutable descriptor produced by the declaration builder
#[derive(Clone, Default)]
pub struct CalculatorType {
    name: Option<String>,
    slug: Option<Slug>,
    version: Option<String>,
    inputs: Vec<InputDefinition>,
    outputs: Vec<OutputDefinition>,
    rules: Vec<Rule>,
    compute: Option<ComputeFn>,
}

impl CalculatorType {
    pub fn builder() -> CalculatorBuilder {
        CalculatorBuilder::default()
    }

    /// Start a subtype that inherits this type's metadata, fields and
    /// computation step; the parent is left untouched
    pub fn extend(&self) -> CalculatorBuilder {
        CalculatorBuilder {
            kind: self.clone(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn slug(&self) -> Option<&Slug> {
        self.slug.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Inputs in declaration order
    pub fn inputs(&self) -> &[InputDefinition] {
        &self.inputs
    }

    /// Outputs in declaration order
    pub fn outputs(&self) -> &[OutputDefinition] {
        &self.outputs
    }

    pub fn input_for(&self, name: &str) -> Option<&InputDefinition> {
        self.inputs.iter().find(|i| i.name() == name)
    }

    pub fn output_for(&self, name: &str) -> Option<&OutputDefinition> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    /// Validation rules registered by input declarations
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn has_compute(&self) -> bool {
        self.compute.is_some()
    }

    pub(crate) fn compute_fn(&self) -> Option<&ComputeFn> {
        self.compute.as_ref()
    }

    /// Name for messages: the declared name, else the slug
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.slug.as_ref().map(|s| s.to_string()))
            .unwrap_or_else(|| "Calculator".to_string())
    }
}

impl fmt::Debug for CalculatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorType")
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("version", &self.version)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("compute", &self.compute.is_some())
            .finish()
    }
}

/// Fluent declaration of a calculator type
#[derive(Default)]
pub struct CalculatorBuilder {
    kind: CalculatorType,
}

impl CalculatorBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.kind.name = Some(name.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<Slug>) -> Self {
        self.kind.slug = Some(slug.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.kind.version = Some(version.into());
        self
    }

    /// Declare an input and register its validation rules
    ///
    /// Fails with a configuration error when the type is not one of the
    /// closed input-type set or the name is already declared.
    pub fn input(
        mut self,
        name: impl Into<String>,
        input_type: impl IntoInputType,
        options: InputOptions,
    ) -> Result<Self> {
        let name = name.into();
        let input_type = input_type.into_input_type()?;

        if self.kind.input_for(&name).is_some() {
            return Err(Error::Config(format!(
                "Input '{}' is already declared on {}",
                name,
                self.kind.display_name()
            )));
        }

        if options.required {
            self.kind.rules.push(Rule::Presence {
                field: name.clone(),
            });
        }
        if let Some(bound) = options.min {
            self.kind.rules.push(Rule::Min {
                field: name.clone(),
                bound,
            });
        }
        if let Some(bound) = options.max {
            self.kind.rules.push(Rule::Max {
                field: name.clone(),
                bound,
            });
        }

        tracing::debug!("Declared input {} ({})", name, input_type);
        self.kind
            .inputs
            .push(InputDefinition::new(name, input_type, options));
        Ok(self)
    }

    /// Declare an output; outputs carry no storage and no validation
    pub fn output(
        mut self,
        name: impl Into<String>,
        output_type: impl Into<String>,
        options: OutputOptions,
    ) -> Result<Self> {
        let name = name.into();
        if self.kind.output_for(&name).is_some() {
            return Err(Error::Config(format!(
                "Output '{}' is already declared on {}",
                name,
                self.kind.display_name()
            )));
        }
        self.kind
            .outputs
            .push(OutputDefinition::new(name, output_type, options));
        Ok(self)
    }

    /// Set the computation step
    pub fn compute(
        mut self,
        f: impl Fn(&Calculator) -> Result<Outputs> + Send + Sync + 'static,
    ) -> Self {
        self.kind.compute = Some(Arc::new(f));
        self
    }

    pub(crate) fn compute_shared(mut self, f: ComputeFn) -> Self {
        self.kind.compute = Some(f);
        self
    }

    pub fn build(self) -> CalculatorType {
        self.kind
    }
}
