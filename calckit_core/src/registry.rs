//! Slug to calculator-type lookup table.

use crate::dsl::CalculatorType;
use crate::slug::Slug;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from slug to calculator type
///
/// The registry holds no lock. Registration is expected at startup; a host
/// that mutates it while other threads read must wrap it (e.g. in an
/// `RwLock`) itself.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    calculators: HashMap<Slug, Arc<CalculatorType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculator type under its declared slug
    ///
    /// Fails with a configuration error if no slug was declared. A type
    /// already registered under the same slug is replaced.
    pub fn register(&mut self, kind: impl Into<Arc<CalculatorType>>) -> Result<Arc<CalculatorType>> {
        let kind = kind.into();
        let slug = match kind.slug() {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => {
                return Err(Error::Config(format!(
                    "Calculator must define a slug ({})",
                    kind.display_name()
                )))
            }
        };

        if self.calculators.insert(slug.clone(), Arc::clone(&kind)).is_some() {
            tracing::warn!("Calculator slug '{}' re-registered; previous type replaced", slug);
        } else {
            tracing::debug!("Registered calculator '{}'", slug);
        }
        Ok(kind)
    }

    /// Look up a calculator type; `None` when the slug is not registered
    pub fn find(&self, slug: impl AsRef<str>) -> Option<Arc<CalculatorType>> {
        self.calculators
            .get(Slug::normalize(slug.as_ref()))
            .cloned()
    }

    /// Look up a calculator type that must exist
    pub fn fetch(&self, slug: impl AsRef<str>) -> Result<Arc<CalculatorType>> {
        let slug = slug.as_ref();
        self.find(slug)
            .ok_or_else(|| Error::NotFound(Slug::normalize(slug).to_string()))
    }

    /// Every registered type, in no particular order
    pub fn all(&self) -> Vec<Arc<CalculatorType>> {
        self.calculators.values().cloned().collect()
    }

    pub fn slugs(&self) -> Vec<Slug> {
        self.calculators.keys().cloned().collect()
    }

    pub fn is_registered(&self, slug: impl AsRef<str>) -> bool {
        self.calculators
            .contains_key(Slug::normalize(slug.as_ref()))
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        self.calculators.clear();
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}
