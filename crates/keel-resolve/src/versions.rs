//! Version listings collected for dynamic module selectors.

use serde::{Deserialize, Serialize};

/// A `group:name` selector with a version requirement, which may be a
/// dynamic pattern such as `1.+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleVersionSelector {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ModuleVersionSelector {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ModuleVersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

/// The versions a repository reported for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListing {
    versions: Vec<String>,
}

impl VersionListing {
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Accumulates listing attempts across repositories. The first repository
/// that produces a listing wins; later listings for the same module are
/// ignored.
#[derive(Debug, Default)]
pub struct VersionListingBuilder {
    listing: Option<VersionListing>,
}

impl VersionListingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit(&mut self, versions: Vec<String>) {
        if self.listing.is_some() {
            tracing::warn!("ignoring additional version listing, already have one");
            return;
        }
        self.listing = Some(VersionListing { versions });
    }

    pub fn has_listing(&self) -> bool {
        self.listing.is_some()
    }

    pub fn build(self) -> VersionListing {
        self.listing.unwrap_or_default()
    }
}

/// Supplies candidate versions for a dynamic selector.
pub trait DynamicVersionSupplier: Send + Sync {
    fn list_versions(&self, selector: &ModuleVersionSelector, builder: &mut VersionListingBuilder);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_listing_wins() {
        let mut builder = VersionListingBuilder::new();
        builder.visit(vec!["1.0".into(), "1.1".into()]);
        builder.visit(vec!["2.0".into()]);
        assert_eq!(builder.build().versions(), ["1.0", "1.1"]);
    }

    #[test]
    fn no_listing_builds_empty() {
        let builder = VersionListingBuilder::new();
        assert!(!builder.has_listing());
        assert!(builder.build().is_empty());
    }

    #[test]
    fn empty_listing_still_counts_as_a_listing() {
        let mut builder = VersionListingBuilder::new();
        builder.visit(Vec::new());
        assert!(builder.has_listing());
        builder.visit(vec!["1.0".into()]);
        assert!(builder.build().is_empty());
    }
}
