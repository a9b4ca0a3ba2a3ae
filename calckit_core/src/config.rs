//! Configuration file support for calckit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/calckit/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where calculator manifests are discovered from
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_calculators_path")]
    pub calculators_path: PathBuf,

    #[serde(default = "default_true")]
    pub auto_register: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            calculators_path: default_calculators_path(),
            auto_register: true,
        }
    }
}

/// Calculation history settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub save_calculations: bool,

    #[serde(default = "default_true")]
    pub warn_on_version_mismatch: bool,

    /// Name of the host hook that yields the tenant scope for saved records
    #[serde(default)]
    pub scope_method: Option<String>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            save_calculations: true,
            warn_on_version_mismatch: true,
            scope_method: None,
            data_dir: default_data_dir(),
        }
    }
}

/// Display settings consumed by form renderers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub enable_live_updates: bool,

    #[serde(default)]
    pub form_classes: FormClasses,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enable_live_updates: true,
            form_classes: FormClasses::default(),
        }
    }
}

/// Default class names for form elements
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FormClasses {
    #[serde(default = "default_input_class")]
    pub input: String,
    #[serde(default = "default_label_class")]
    pub label: String,
    #[serde(default = "default_error_class")]
    pub error: String,
    #[serde(default = "default_submit_class")]
    pub submit: String,
}

impl Default for FormClasses {
    fn default() -> Self {
        Self {
            input: default_input_class(),
            label: default_label_class(),
            error: default_error_class(),
            submit: default_submit_class(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_calculators_path() -> PathBuf {
    PathBuf::from("calculators")
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("calckit")
}

fn default_input_class() -> String {
    "form-control".into()
}

fn default_label_class() -> String {
    "block text-sm font-medium mb-1".into()
}

fn default_error_class() -> String {
    "text-red-500 text-sm mt-1".into()
}

fn default_submit_class() -> String {
    "btn btn-primary".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("calckit").join("config.toml")
    }

    /// Apply a single in-place mutation pass
    pub fn configure(&mut self, f: impl FnOnce(&mut Config)) {
        f(self);
    }

    /// File holding saved calculation records
    pub fn history_path(&self) -> PathBuf {
        self.history.data_dir.join("calculations.jsonl")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    ///
    /// The file is written to a temp file in the same directory and renamed
    /// over the target.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
