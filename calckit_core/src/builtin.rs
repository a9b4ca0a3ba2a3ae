//! Built-in calculators bundled with calckit.
//!
//! The computation steps live in a shared [`ComputeTable`] keyed by slug, so
//! manifests discovered on disk can reuse them.

use crate::calculator::Calculator;
use crate::definition::{InputOptions, InputType, OutputOptions};
use crate::discovery::ComputeTable;
use crate::dsl::{CalculatorType, ComputeFn};
use crate::registry::Registry;
use crate::value::{FieldValue, Outputs};
use crate::{Error, Result};
use once_cell::sync::Lazy;

/// Cached compute table - built once and reused across all operations
static COMPUTE_TABLE: Lazy<ComputeTable> = Lazy::new(|| {
    ComputeTable::new()
        .with("tip", tip)
        .with("bmi", bmi)
        .with("compound_interest", compound_interest)
        .with("days_between", days_between)
});

/// Computation steps of the built-in calculators, keyed by slug
pub fn compute_table() -> &'static ComputeTable {
    &COMPUTE_TABLE
}

fn outputs<const N: usize>(pairs: [(&str, FieldValue); N]) -> Outputs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn step(slug: &str) -> Result<ComputeFn> {
    compute_table()
        .get(slug)
        .cloned()
        .ok_or_else(|| Error::Config(format!("No built-in computation for '{}'", slug)))
}

// ============================================================================
// Computation steps
// ============================================================================

fn tip(calc: &Calculator) -> Result<Outputs> {
    let bill = calc.decimal("bill")?;
    let percent = calc.decimal("tip_percent")?;
    let people = calc.integer("people").unwrap_or(1).max(1);

    let tip = bill * percent / 100.0;
    let total = bill + tip;
    Ok(outputs([
        ("tip", FieldValue::Decimal(tip)),
        ("total", FieldValue::Decimal(total)),
        ("per_person", FieldValue::Decimal(total / people as f64)),
    ]))
}

fn bmi(calc: &Calculator) -> Result<Outputs> {
    let weight = calc.decimal("weight_kg")?;
    let height_m = calc.decimal("height_cm")? / 100.0;

    let bmi = weight / (height_m * height_m);
    let category = if bmi < 18.5 {
        "Underweight"
    } else if bmi < 25.0 {
        "Normal"
    } else if bmi < 30.0 {
        "Overweight"
    } else {
        "Obese"
    };
    Ok(outputs([
        ("bmi", FieldValue::Decimal(bmi)),
        ("category", FieldValue::from(category)),
    ]))
}

fn compound_interest(calc: &Calculator) -> Result<Outputs> {
    let principal = calc.decimal("principal")?;
    let rate = calc.decimal("annual_rate")? / 100.0;
    let years = calc.integer("years")?;
    let periods = compounding_periods(calc)?;

    let final_amount = principal * (1.0 + rate / periods).powf(periods * years as f64);
    Ok(outputs([
        ("final_amount", FieldValue::Decimal(final_amount)),
        ("interest_earned", FieldValue::Decimal(final_amount - principal)),
    ]))
}

// Periods per year from the `frequency` select; must be a declared option
// and a positive number.
fn compounding_periods(calc: &Calculator) -> Result<f64> {
    let frequency = calc.text("frequency")?;
    let declared = calc
        .kind()
        .input_for("frequency")
        .and_then(|input| input.options_for_select());
    if let Some(options) = declared {
        if !options.iter().any(|option| option.value == frequency) {
            return Err(Error::Calculation(format!(
                "frequency '{}' is not one of the declared options",
                frequency
            )));
        }
    }

    match frequency.trim().parse::<f64>() {
        Ok(periods) if periods.is_finite() && periods > 0.0 => Ok(periods),
        _ => Err(Error::Calculation(format!(
            "frequency '{}' is not a positive number of periods",
            frequency
        ))),
    }
}

fn days_between(calc: &Calculator) -> Result<Outputs> {
    let start = calc.date("start_date")?;
    let end = calc.date("end_date")?;
    let include_end = matches!(calc.value("include_end"), Some(FieldValue::Boolean(true)));

    let mut days = (end - start).num_days();
    if include_end {
        days += if days < 0 { -1 } else { 1 };
    }
    Ok(outputs([("days", FieldValue::Integer(days))]))
}

// ============================================================================
// Declarations
// ============================================================================

/// Builds the built-in calculator types
pub fn calculators() -> Result<Vec<CalculatorType>> {
    let tip = CalculatorType::builder()
        .name("Tip Splitter")
        .slug("tip")
        .version("1.0")
        .input(
            "bill",
            InputType::Decimal,
            InputOptions::new().required().min(0.0).step(0.01).placeholder("0.00"),
        )?
        .input(
            "tip_percent",
            InputType::Decimal,
            InputOptions::new()
                .label("Tip %")
                .required()
                .min(0.0)
                .max(100.0)
                .default_value(15.0),
        )?
        .input(
            "people",
            InputType::Integer,
            InputOptions::new().min(1.0).default_value(1_i64).hint("Split the total evenly"),
        )?
        .output("tip", "currency", OutputOptions::new())?
        .output("total", "currency", OutputOptions::new())?
        .output("per_person", "currency", OutputOptions::new())?
        .compute_shared(step("tip")?)
        .build();

    let bmi = CalculatorType::builder()
        .name("Body Mass Index")
        .slug("bmi")
        .version("1.0")
        .input(
            "weight_kg",
            InputType::Decimal,
            InputOptions::new().label("Weight (kg)").required().min(1.0),
        )?
        .input(
            "height_cm",
            InputType::Decimal,
            InputOptions::new()
                .label("Height (cm)")
                .required()
                .min(30.0)
                .max(300.0),
        )?
        .output("bmi", "decimal", OutputOptions::new().label("BMI"))?
        .output("category", "string", OutputOptions::new())?
        .compute_shared(step("bmi")?)
        .build();

    let compound = CalculatorType::builder()
        .name("Compound Interest")
        .slug("compound_interest")
        .version("1.0")
        .input(
            "principal",
            InputType::Decimal,
            InputOptions::new().required().min(0.0),
        )?
        .input(
            "annual_rate",
            InputType::Decimal,
            InputOptions::new()
                .required()
                .min(0.0)
                .max(100.0)
                .hint("Percent per year"),
        )?
        .input(
            "years",
            InputType::Integer,
            InputOptions::new().required().min(1.0).max(100.0),
        )?
        .input(
            "frequency",
            InputType::Select,
            InputOptions::new()
                .label("Compounding")
                .required()
                .default_value("12")
                .select([
                    ("Annually", "1"),
                    ("Quarterly", "4"),
                    ("Monthly", "12"),
                    ("Daily", "365"),
                ]),
        )?
        .output("final_amount", "currency", OutputOptions::new())?
        .output("interest_earned", "currency", OutputOptions::new())?
        .compute_shared(step("compound_interest")?)
        .build();

    let days = CalculatorType::builder()
        .name("Days Between Dates")
        .slug("days_between")
        .version("1.0")
        .input("start_date", InputType::Date, InputOptions::new().required())?
        .input("end_date", InputType::Date, InputOptions::new().required())?
        .input(
            "include_end",
            InputType::Boolean,
            InputOptions::new().label("Include end date").default_value(false),
        )?
        .output("days", "integer", OutputOptions::new())?
        .compute_shared(step("days_between")?)
        .build();

    Ok(vec![tip, bmi, compound, days])
}

/// Register every built-in calculator
pub fn register_all(registry: &mut Registry) -> Result<usize> {
    let kinds = calculators()?;
    let count = kinds.len();
    for kind in kinds {
        registry.register(kind)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();
        registry
    }

    fn run(slug: &str, inputs: serde_json::Value) -> Outputs {
        let kind = registry().fetch(slug).unwrap();
        let params = inputs.as_object().unwrap().clone();
        let mut calc = Calculator::with_inputs(kind, params).unwrap();
        calc.run_strict().unwrap()
    }

    #[test]
    fn test_catalog_loads() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        for slug in ["tip", "bmi", "compound_interest", "days_between"] {
            assert!(registry.is_registered(slug), "{slug} missing");
        }
    }

    #[test]
    fn test_every_builtin_has_compute_step() {
        for kind in calculators().unwrap() {
            assert!(kind.has_compute(), "{:?} has no compute step", kind.slug());
            let slug = kind.slug().unwrap();
            assert!(compute_table().get(slug.as_str()).is_some());
        }
    }

    #[test]
    fn test_tip() {
        let out = run("tip", json!({"bill": "80", "tip_percent": 25, "people": 2}));
        assert_eq!(out["tip"], FieldValue::Decimal(20.0));
        assert_eq!(out["total"], FieldValue::Decimal(100.0));
        assert_eq!(out["per_person"], FieldValue::Decimal(50.0));
    }

    #[test]
    fn test_tip_rejects_out_of_range_percent() {
        let kind = registry().fetch("tip").unwrap();
        let mut calc =
            Calculator::with_inputs(kind, [("bill", json!(10)), ("tip_percent", json!(150))])
                .unwrap();
        assert_eq!(calc.run().unwrap(), None);
        assert_eq!(
            calc.errors().get("tip_percent"),
            &["must be less than or equal to 100".to_string()]
        );
    }

    #[test]
    fn test_bmi() {
        let out = run("bmi", json!({"weight_kg": 72, "height_cm": 180}));
        let FieldValue::Decimal(bmi) = out["bmi"] else {
            panic!("bmi should be a decimal");
        };
        assert!((bmi - 22.22).abs() < 0.01);
        assert_eq!(out["category"], FieldValue::from("Normal"));
    }

    #[test]
    fn test_compound_interest() {
        let out = run(
            "compound_interest",
            json!({"principal": 1000, "annual_rate": 10, "years": 2, "frequency": "1"}),
        );
        let FieldValue::Decimal(amount) = out["final_amount"] else {
            panic!("final_amount should be a decimal");
        };
        assert!((amount - 1210.0).abs() < 1e-9);
    }

    #[test]
    fn test_compound_interest_rejects_bad_frequency() {
        let kind = registry().fetch("compound_interest").unwrap();
        for frequency in ["0", "7"] {
            let mut calc = Calculator::with_inputs(
                Arc::clone(&kind),
                [
                    ("principal", json!(1000)),
                    ("annual_rate", json!(5)),
                    ("years", json!(1)),
                    ("frequency", json!(frequency)),
                ],
            )
            .unwrap();
            let err = calc.run().unwrap_err();
            assert!(matches!(err, Error::Calculation(_)), "{frequency}: {err}");
        }
    }

    #[test]
    fn test_compound_interest_manifest_frequency_must_be_positive() {
        let kind = CalculatorType::builder()
            .slug("loose_interest")
            .input("principal", InputType::Decimal, InputOptions::new())
            .unwrap()
            .input("annual_rate", InputType::Decimal, InputOptions::new())
            .unwrap()
            .input("years", InputType::Integer, InputOptions::new())
            .unwrap()
            .input("frequency", InputType::String, InputOptions::new())
            .unwrap()
            .compute_shared(step("compound_interest").unwrap())
            .build();
        let mut calc = Calculator::with_inputs(
            Arc::new(kind),
            [
                ("principal", json!(1000)),
                ("annual_rate", json!(5)),
                ("years", json!(1)),
                ("frequency", json!("0")),
            ],
        )
        .unwrap();
        assert!(matches!(calc.calculate(), Err(Error::Calculation(_))));
    }

    #[test]
    fn test_days_between() {
        let out = run(
            "days_between",
            json!({"start_date": "2024-01-01", "end_date": "2024-03-01"}),
        );
        assert_eq!(out["days"], FieldValue::Integer(60));

        let out = run(
            "days_between",
            json!({"start_date": "2024-01-01", "end_date": "2024-01-10", "include_end": "yes"}),
        );
        assert_eq!(out["days"], FieldValue::Integer(10));
    }

    #[test]
    fn test_select_default_resolves() {
        let kind = registry().fetch("compound_interest").unwrap();
        let frequency = kind.input_for("frequency").unwrap();
        assert_eq!(frequency.resolve_default(), Some(FieldValue::from("12")));
        assert_eq!(frequency.options_for_select().unwrap().len(), 4);
    }
}
