//! Calculator manifest discovery.
//!
//! Calculator types can be declared in TOML manifests placed under the
//! configured `calculators_path`. A manifest carries the same metadata the
//! builder accepts, plus a `compute` key naming a computation step from a
//! [`ComputeTable`]:
//!
//! ```toml
//! name = "Doubler"
//! slug = "doubler"
//! version = "1.0"
//! compute = "double"
//!
//! [[inputs]]
//! name = "value"
//! type = "decimal"
//! required = true
//! min = 0
//!
//! [[outputs]]
//! name = "doubled"
//! type = "decimal"
//! ```
//!
//! Manifests go through [`CalculatorBuilder`](crate::CalculatorBuilder), so an
//! unknown input type fails discovery with a configuration error.

use crate::calculator::Calculator;
use crate::definition::{InputOptions, OutputOptions, SelectOption};
use crate::dsl::{CalculatorType, ComputeFn};
use crate::value::{FieldValue, Outputs};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Named computation steps that manifests can refer to
#[derive(Clone, Default)]
pub struct ComputeTable {
    steps: HashMap<String, ComputeFn>,
}

impl ComputeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&Calculator) -> Result<Outputs> + Send + Sync + 'static,
    ) {
        self.steps.insert(name.into(), Arc::new(f));
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Calculator) -> Result<Outputs> + Send + Sync + 'static,
    ) -> Self {
        self.insert(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ComputeFn> {
        self.steps.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// One calculator declared in TOML
#[derive(Debug, Deserialize)]
pub struct CalculatorManifest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub version: Option<String>,
    /// Key into the compute table; absent means no computation step
    pub compute: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputManifest>,
    #[serde(default)]
    pub outputs: Vec<OutputManifest>,
}

#[derive(Debug, Deserialize)]
pub struct InputManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub default: Option<FieldValue>,
    pub placeholder: Option<String>,
    pub hint: Option<String>,
    pub options: Option<Vec<SelectOption>>,
}

impl From<&InputManifest> for InputOptions {
    fn from(input: &InputManifest) -> Self {
        InputOptions {
            label: input.label.clone(),
            required: input.required,
            min: input.min,
            max: input.max,
            step: input.step,
            default: input
                .default
                .clone()
                .map(crate::definition::DefaultValue::Literal),
            placeholder: input.placeholder.clone(),
            hint: input.hint.clone(),
            options: input.options.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OutputManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: String,
    pub label: Option<String>,
    pub format: Option<String>,
}

impl CalculatorManifest {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Declare the calculator type this manifest describes
    pub fn into_type(self, table: &ComputeTable) -> Result<CalculatorType> {
        let mut builder = CalculatorType::builder();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(slug) = self.slug {
            builder = builder.slug(slug);
        }
        if let Some(version) = self.version {
            builder = builder.version(version);
        }

        for input in &self.inputs {
            builder = builder.input(input.name.clone(), input.input_type.as_str(), input.into())?;
        }
        for output in self.outputs {
            builder = builder.output(
                output.name,
                output.output_type,
                OutputOptions {
                    label: output.label,
                    format: output.format,
                },
            )?;
        }

        if let Some(key) = self.compute {
            let step = table.get(&key).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown computation '{}'. Available: {}",
                    key,
                    table.names().join(", ")
                ))
            })?;
            builder = builder.compute_shared(Arc::clone(step));
        }

        Ok(builder.build())
    }
}

/// Load one manifest file
pub fn load_manifest(path: &Path, table: &ComputeTable) -> Result<CalculatorType> {
    let contents = std::fs::read_to_string(path)?;
    let manifest = CalculatorManifest::parse(&contents)?;
    manifest.into_type(table).map_err(|e| match e {
        Error::Config(message) => Error::Config(format!("{}: {}", path.display(), message)),
        other => other,
    })
}

/// Load every `*.toml` manifest in a directory, in file-name order
///
/// A missing directory yields no calculators.
pub fn discover(dir: &Path, table: &ComputeTable) -> Result<Vec<CalculatorType>> {
    if !dir.exists() {
        tracing::debug!("No calculators directory at {:?}", dir);
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let kinds = paths
        .iter()
        .map(|path| load_manifest(path, table))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!("Discovered {} calculator(s) in {:?}", kinds.len(), dir);
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InputType;
    use serde_json::json;

    const DOUBLER: &str = r#"
name = "Doubler"
slug = "doubler"
version = "1.0"
compute = "double"

[[inputs]]
name = "value"
type = "decimal"
required = true
min = 0
hint = "Any non-negative number"

[[outputs]]
name = "doubled"
type = "decimal"
format = "decimal"
"#;

    fn table() -> ComputeTable {
        ComputeTable::new().with("double", |calc| {
            Ok(Outputs::from([(
                "doubled".to_string(),
                FieldValue::Decimal(calc.decimal("value")? * 2.0),
            )]))
        })
    }

    #[test]
    fn test_manifest_builds_type() {
        let kind = CalculatorManifest::parse(DOUBLER)
            .unwrap()
            .into_type(&table())
            .unwrap();
        assert_eq!(kind.name(), Some("Doubler"));
        assert_eq!(kind.slug().unwrap(), "doubler");
        let input = kind.input_for("value").unwrap();
        assert_eq!(input.input_type(), InputType::Decimal);
        assert!(input.is_required());
        assert_eq!(input.min(), Some(0.0));
        assert_eq!(input.hint(), Some("Any non-negative number"));
        assert_eq!(kind.output_for("doubled").unwrap().format(), Some("decimal"));

        let mut calc = Calculator::with_inputs(Arc::new(kind), [("value", json!(4))]).unwrap();
        let outputs = calc.run().unwrap().unwrap();
        assert_eq!(outputs.get("doubled"), Some(&FieldValue::Decimal(8.0)));
    }

    #[test]
    fn test_unknown_input_type_in_manifest() {
        let manifest = DOUBLER.replace("type = \"decimal\"\nrequired", "type = \"money\"\nrequired");
        let err = CalculatorManifest::parse(&manifest)
            .unwrap()
            .into_type(&table())
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("money"));
    }

    #[test]
    fn test_unknown_compute_key() {
        let err = CalculatorManifest::parse(DOUBLER)
            .unwrap()
            .into_type(&ComputeTable::new())
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("double"));
    }

    #[test]
    fn test_discover_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("doubler.toml"), DOUBLER).unwrap();
        std::fs::write(
            temp_dir.path().join("base.toml"),
            "name = \"Base\"\nslug = \"base\"\nversion = \"0.1\"\n",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let kinds = discover(temp_dir.path(), &table()).unwrap();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].slug().unwrap(), "base");
        assert!(!kinds[0].has_compute());
        assert_eq!(kinds[1].slug().unwrap(), "doubler");
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let kinds = discover(&temp_dir.path().join("absent"), &table()).unwrap();
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_load_manifest_error_names_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dup.toml");
        std::fs::write(
            &path,
            "slug = \"dup\"\n[[inputs]]\nname = \"a\"\ntype = \"string\"\n[[inputs]]\nname = \"a\"\ntype = \"string\"\n",
        )
        .unwrap();
        let err = load_manifest(&path, &table()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("dup.toml"));
    }
}
