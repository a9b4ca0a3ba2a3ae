//! Calculator slugs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier under which a calculator type is registered and looked up
///
/// Slugs are stored trimmed, so `"tip"`, `" tip "` and a `Slug` built from
/// either all refer to the same calculator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn new(slug: impl AsRef<str>) -> Self {
        Self(Self::normalize(slug.as_ref()).to_string())
    }

    /// Canonical form used for storage and lookup
    pub fn normalize(slug: &str) -> &str {
        slug.trim()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Slug {
    fn from(slug: &str) -> Self {
        Slug::new(slug)
    }
}

impl From<String> for Slug {
    fn from(slug: String) -> Self {
        Slug::new(slug)
    }
}

impl PartialEq<str> for Slug {
    fn eq(&self, other: &str) -> bool {
        self.0 == Slug::normalize(other)
    }
}

impl PartialEq<&str> for Slug {
    fn eq(&self, other: &&str) -> bool {
        self.0 == Slug::normalize(other)
    }
}
