#![forbid(unsafe_code)]

//! Core library for declaring and running calckit calculators.
//!
//! This crate provides:
//! - Typed field definitions and input casting
//! - The declaration builder and immutable calculator types
//! - Calculator instances (assignment, validation, computation)
//! - An explicit registry and configuration context
//! - Calculation history (JSONL records, version checks)
//! - Manifest discovery and a small built-in catalog

pub mod error;
pub mod value;
pub mod definition;
pub mod validation;
pub mod slug;
pub mod dsl;
pub mod calculator;
pub mod registry;
pub mod config;
pub mod logging;
pub mod history;
pub mod format;
pub mod discovery;
pub mod builtin;
pub mod context;

// Re-export commonly used types
pub use error::{Error, Result};
pub use value::{cast, Cast, FieldValue, Outputs};
pub use definition::{
    DefaultValue, InputDefinition, InputOptions, InputType, IntoInputType, OutputDefinition,
    OutputOptions, Producer, SelectOption,
};
pub use validation::{Rule, ValidationErrors};
pub use slug::Slug;
pub use dsl::{CalculatorBuilder, CalculatorType, ComputeFn};
pub use calculator::{Calculator, CalculatorState};
pub use registry::Registry;
pub use config::Config;
pub use history::{
    load_saved_calculations, read_records, save_calculation, CalculationRecord, JsonlSink,
    RecordSink,
};
pub use format::{format_for, format_output};
pub use discovery::{CalculatorManifest, ComputeTable};
pub use context::CalcKit;
