//! The explicit calckit context: one configuration and one registry.
//!
//! Hosts build a [`CalcKit`] at startup, configure it, register calculator
//! types (directly, from the built-in catalog, or from discovered manifests),
//! and pass it to whatever needs lookups or settings.

use crate::config::Config;
use crate::discovery::{self, ComputeTable};
use crate::dsl::CalculatorType;
use crate::registry::Registry;
use crate::slug::Slug;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct CalcKit {
    config: Config,
    registry: Registry,
}

impl CalcKit {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Single mutation pass over the settings
    pub fn configure(&mut self, f: impl FnOnce(&mut Config)) -> &mut Self {
        self.config.configure(f);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn register(&mut self, kind: impl Into<Arc<CalculatorType>>) -> Result<Arc<CalculatorType>> {
        self.registry.register(kind)
    }

    pub fn find(&self, slug: impl AsRef<str>) -> Option<Arc<CalculatorType>> {
        self.registry.find(slug)
    }

    /// Lookup for host glue; a missing slug is [`Error::NotFound`](crate::Error::NotFound)
    pub fn fetch(&self, slug: impl AsRef<str>) -> Result<Arc<CalculatorType>> {
        self.registry.fetch(slug)
    }

    pub fn all(&self) -> Vec<Arc<CalculatorType>> {
        self.registry.all()
    }

    pub fn slugs(&self) -> Vec<Slug> {
        self.registry.slugs()
    }

    /// Register the built-in catalog
    pub fn register_builtins(&mut self) -> Result<usize> {
        crate::builtin::register_all(&mut self.registry)
    }

    /// Discover and register manifests under `root/calculators_path`
    ///
    /// Does nothing when `auto_register` is off or the directory is missing.
    pub fn auto_register(&mut self, root: &Path, table: &ComputeTable) -> Result<usize> {
        if !self.config.discovery.auto_register {
            tracing::debug!("Auto-registration disabled");
            return Ok(0);
        }

        let dir = root.join(&self.config.discovery.calculators_path);
        let kinds = discovery::discover(&dir, table)?;
        let count = kinds.len();
        for kind in kinds {
            self.registry.register(kind)?;
        }
        Ok(count)
    }
}
