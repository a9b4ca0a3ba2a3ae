//! Calculation history.
//!
//! A successful run can be persisted as a [`CalculationRecord`]. Records are
//! appended to a JSONL (JSON Lines) file with file locking, and can later be
//! turned back into a calculator instance for re-display or a version check.

use crate::calculator::Calculator;
use crate::config::Config;
use crate::dsl::CalculatorType;
use crate::registry::Registry;
use crate::value::{FieldValue, Outputs};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Default number of records returned by [`load_saved_calculations`]
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Shown when a record was produced by a different calculator version
pub const VERSION_MISMATCH_WARNING: &str =
    "This calculation was made with a different version of the calculator and may have outdated results.";

/// A persisted snapshot of one successful run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalculationRecord {
    pub id: Uuid,
    /// Slug of the calculator type, as text
    pub calculator_type: String,
    pub calculator_version: String,
    /// Tenant/ownership scope, when the host supplies one
    #[serde(default)]
    pub scope: Option<String>,
    /// Raw input values, re-cast on reconstruction
    pub inputs: BTreeMap<String, Value>,
    pub outputs: Outputs,
    pub created_at: DateTime<Utc>,
}

impl CalculationRecord {
    pub fn new(
        calculator_type: impl Into<String>,
        calculator_version: impl Into<String>,
        inputs: BTreeMap<String, Value>,
        outputs: Outputs,
        scope: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            calculator_type: calculator_type.into(),
            calculator_version: calculator_version.into(),
            scope,
            inputs,
            outputs,
            created_at: Utc::now(),
        }
    }

    /// Presence checks over the stored fields; empty when the record is complete
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.calculator_type.trim().is_empty() {
            errors.push("Calculator type can't be blank".to_string());
        }
        if self.calculator_version.trim().is_empty() {
            errors.push("Calculator version can't be blank".to_string());
        }
        if self.inputs.is_empty() {
            errors.push("Inputs can't be blank".to_string());
        }
        if self.outputs.is_empty() {
            errors.push("Outputs can't be blank".to_string());
        }
        // Non-finite decimals serialize as null and could not be read back.
        for (name, value) in &self.outputs {
            if matches!(value, FieldValue::Decimal(d) if !d.is_finite()) {
                errors.push(format!("Output {} is not a finite number", name));
            }
        }
        errors
    }

    /// The live calculator type this record was produced by, if still registered
    pub fn calculator_type_in(&self, registry: &Registry) -> Option<Arc<CalculatorType>> {
        registry.find(&self.calculator_type)
    }

    /// Rebuild a calculator instance from the stored inputs
    ///
    /// Inputs the live type no longer declares are dropped. Returns `None`
    /// when the type is no longer registered.
    pub fn to_calculator(&self, registry: &Registry) -> Option<Calculator> {
        let kind = self.calculator_type_in(registry)?;
        Some(Calculator::from_params(
            kind,
            self.inputs
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone())),
        ))
    }

    /// True when the live type declares the same version as the record
    pub fn is_version_current(&self, registry: &Registry) -> bool {
        self.calculator_type_in(registry)
            .map(|kind| kind.version() == Some(self.calculator_version.as_str()))
            .unwrap_or(false)
    }

    /// True when the versions differ or the type is no longer registered
    pub fn is_version_mismatch(&self, registry: &Registry) -> bool {
        !self.is_version_current(registry)
    }

    /// Warning to show alongside a mismatched record, unless disabled
    pub fn version_warning(&self, config: &Config, registry: &Registry) -> Option<&'static str> {
        if !config.history.warn_on_version_mismatch || self.is_version_current(registry) {
            return None;
        }
        tracing::warn!(
            "Record {} was made with {} version {}",
            self.id,
            self.calculator_type,
            self.calculator_version
        );
        Some(VERSION_MISMATCH_WARNING)
    }
}

/// Record sink trait for persisting calculations
pub trait RecordSink {
    fn append(&mut self, record: &CalculationRecord) -> Result<()>;
}

/// JSONL-based record sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &CalculationRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended calculation {} to {:?}", record.id, self.path);
        Ok(())
    }
}

/// In-memory sink, for hosts that persist records themselves
impl RecordSink for Vec<CalculationRecord> {
    fn append(&mut self, record: &CalculationRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Read all records from a JSONL file
pub fn read_records(path: &Path) -> Result<Vec<CalculationRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CalculationRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse calculation at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} calculations from {:?}", records.len(), path);
    Ok(records)
}

/// Persist a successful run, unless saving is disabled
///
/// Returns the stored record, or `None` when `save_calculations` is off.
pub fn save_calculation(
    config: &Config,
    sink: &mut impl RecordSink,
    calculator: &Calculator,
    outputs: &Outputs,
    scope: Option<&str>,
) -> Result<Option<CalculationRecord>> {
    if !config.history.save_calculations {
        tracing::debug!("Saving calculations is disabled");
        return Ok(None);
    }

    let record = calculator.to_record(outputs, scope)?;
    let problems = record.validate();
    if !problems.is_empty() {
        return Err(Error::Other(format!(
            "Calculation record is incomplete: {}",
            problems.join(", ")
        )));
    }

    sink.append(&record)?;
    Ok(Some(record))
}

/// Saved records of one calculator type, newest first
///
/// Reads `config.history_path()`. Empty when `save_calculations` is off.
/// When `scope` is given only records saved under that scope are returned.
pub fn load_saved_calculations(
    config: &Config,
    slug: &str,
    scope: Option<&str>,
    limit: usize,
) -> Result<Vec<CalculationRecord>> {
    if !config.history.save_calculations {
        tracing::debug!("Saving calculations is disabled");
        return Ok(Vec::new());
    }

    let slug = crate::slug::Slug::normalize(slug);
    let mut records: Vec<CalculationRecord> = read_records(&config.history_path())?
        .into_iter()
        .filter(|r| r.calculator_type == slug)
        .filter(|r| scope.map_or(true, |s| r.scope.as_deref() == Some(s)))
        .collect();

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(limit);

    tracing::debug!("Loaded {} saved calculations for {}", records.len(), slug);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InputOptions, InputType, OutputOptions};
    use chrono::Duration;
    use serde_json::json;

    fn versioned(version: &str) -> CalculatorType {
        CalculatorType::builder()
            .name("Versioned Calculator")
            .slug("versioned")
            .version(version)
            .input("value", InputType::Decimal, InputOptions::new().required())
            .unwrap()
            .output("result", "decimal", OutputOptions::new())
            .unwrap()
            .compute(|calc| {
                Ok(Outputs::from([(
                    "result".to_string(),
                    FieldValue::Decimal(calc.decimal("value")?),
                )]))
            })
            .build()
    }

    fn record(version: &str) -> CalculationRecord {
        CalculationRecord::new(
            "versioned",
            version,
            BTreeMap::from([("value".to_string(), json!("5.0"))]),
            Outputs::from([("result".to_string(), FieldValue::Decimal(5.0))]),
            None,
        )
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(versioned("2.0")).unwrap();
        registry
    }

    #[test]
    fn test_version_current_when_versions_match() {
        let registry = registry();
        assert!(record("2.0").is_version_current(&registry));
        assert!(!record("2.0").is_version_mismatch(&registry));
    }

    #[test]
    fn test_version_mismatch_when_versions_differ() {
        let registry = registry();
        assert!(!record("1.0").is_version_current(&registry));
        assert!(record("1.0").is_version_mismatch(&registry));
    }

    #[test]
    fn test_version_mismatch_when_type_missing() {
        let mut rec = record("1.0");
        rec.calculator_type = "nonexistent".into();
        let registry = registry();
        assert!(!rec.is_version_current(&registry));
        assert!(rec.is_version_mismatch(&registry));
        assert!(rec.to_calculator(&registry).is_none());
    }

    #[test]
    fn test_to_calculator_despite_mismatch() {
        let registry = registry();
        let rec = record("1.0");
        let mut calc = rec.to_calculator(&registry).unwrap();
        assert_eq!(calc.value("value"), Some(&FieldValue::Decimal(5.0)));
        let outputs = calc.run().unwrap().unwrap();
        assert_eq!(outputs.get("result"), Some(&FieldValue::Decimal(5.0)));
    }

    #[test]
    fn test_to_calculator_drops_removed_inputs() {
        let registry = registry();
        let mut rec = record("1.0");
        rec.inputs.insert("legacy".into(), json!(3));
        let calc = rec.to_calculator(&registry).unwrap();
        assert_eq!(calc.input_values().len(), 1);
    }

    #[test]
    fn test_version_warning_respects_config() {
        let registry = registry();
        let mut config = Config::default();
        assert_eq!(
            record("1.0").version_warning(&config, &registry),
            Some(VERSION_MISMATCH_WARNING)
        );
        assert_eq!(record("2.0").version_warning(&config, &registry), None);

        config.history.warn_on_version_mismatch = false;
        assert_eq!(record("1.0").version_warning(&config, &registry), None);
    }

    #[test]
    fn test_record_validation() {
        assert!(record("1.0").validate().is_empty());
        let empty = CalculationRecord::new("", "", BTreeMap::new(), Outputs::new(), None);
        assert_eq!(empty.validate().len(), 4);
    }

    #[test]
    fn test_append_and_read_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history").join("calculations.jsonl");

        let mut sink = JsonlSink::new(&path);
        let first = record("1.0");
        sink.append(&first).unwrap();
        sink.append(&record("2.0")).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("none.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("calculations.jsonl");
        let good = serde_json::to_string(&record("1.0")).unwrap();
        std::fs::write(&path, format!("{{ not json\n\n{}\n", good)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_save_calculation_honors_toggle() {
        let registry = registry();
        let kind = registry.fetch("versioned").unwrap();
        let mut calc = Calculator::with_inputs(kind, [("value", json!(4))]).unwrap();
        let outputs = calc.run().unwrap().unwrap();

        let mut sink: Vec<CalculationRecord> = Vec::new();
        let mut config = Config::default();
        let saved = save_calculation(&config, &mut sink, &calc, &outputs, Some("acct"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.calculator_type, "versioned");
        assert_eq!(saved.calculator_version, "2.0");
        assert_eq!(sink.len(), 1);

        config.history.save_calculations = false;
        let skipped = save_calculation(&config, &mut sink, &calc, &outputs, None).unwrap();
        assert!(skipped.is_none());
        assert_eq!(sink.len(), 1);
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.configure(|c| c.history.data_dir = dir.to_path_buf());
        config
    }

    #[test]
    fn test_non_finite_outputs_are_not_saved() {
        let mut rec = record("1.0");
        rec.outputs
            .insert("ratio".into(), FieldValue::Decimal(f64::INFINITY));
        rec.outputs.insert("mean".into(), FieldValue::Decimal(f64::NAN));
        let problems = rec.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("ratio")));

        let kind = Arc::new(
            CalculatorType::builder()
                .slug("divider")
                .version("1.0")
                .input("value", InputType::Decimal, InputOptions::new())
                .unwrap()
                .compute(|calc| {
                    Ok(Outputs::from([(
                        "ratio".to_string(),
                        FieldValue::Decimal(1.0 / calc.decimal("value")?),
                    )]))
                })
                .build(),
        );
        let mut calc = Calculator::with_inputs(kind, [("value", json!(0))]).unwrap();
        let outputs = calc.run().unwrap().unwrap();

        let temp_dir = tempfile::tempdir().unwrap();
        let config = config_in(temp_dir.path());
        let mut sink = JsonlSink::new(config.history_path());
        let err = save_calculation(&config, &mut sink, &calc, &outputs, None).unwrap_err();
        assert!(err.to_string().contains("finite"));
        assert!(!config.history_path().exists());
    }

    #[test]
    fn test_load_saved_calculations_empty_when_saving_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = config_in(temp_dir.path());
        JsonlSink::new(config.history_path())
            .append(&record("2.0"))
            .unwrap();
        assert_eq!(
            load_saved_calculations(&config, "versioned", None, 5).unwrap().len(),
            1
        );

        config.history.save_calculations = false;
        assert!(load_saved_calculations(&config, "versioned", None, 5)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_saved_calculations_filters_and_orders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = config_in(temp_dir.path());
        let mut sink = JsonlSink::new(config.history_path());

        let now = Utc::now();
        for (i, scope) in ["a", "b", "a", "a"].iter().enumerate() {
            let mut rec = record("2.0");
            rec.scope = Some(scope.to_string());
            rec.created_at = now - Duration::minutes(10 - i as i64);
            sink.append(&rec).unwrap();
        }
        let mut other = record("2.0");
        other.calculator_type = "other".into();
        sink.append(&other).unwrap();

        let all = load_saved_calculations(&config, "versioned", None, 10).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let scoped = load_saved_calculations(&config, "versioned", Some("a"), 2).unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|r| r.scope.as_deref() == Some("a")));
        assert_eq!(scoped[0].created_at, now - Duration::minutes(7));
    }
}
