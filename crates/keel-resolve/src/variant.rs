//! Variant selection: match requested linkage and platform axes against a
//! library's binaries.

use crate::error::{ResolveError, Result};
use crate::library::{BinaryVariant, Linkage, VariantComponent};

/// What a dependency declaration asked for. `None` on any axis is a
/// wildcard; `None` linkage means the default, which is `shared`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantCriteria {
    pub linkage: Option<Linkage>,
    pub flavor: Option<String>,
    pub platform: Option<String>,
    pub build_type: Option<String>,
}

impl VariantCriteria {
    pub fn for_linkage(linkage: Linkage) -> Self {
        Self {
            linkage: Some(linkage),
            ..Self::default()
        }
    }

    /// Parse the linkage token of a dependency declaration.
    pub fn parse_linkage(token: &str) -> Result<Linkage> {
        match token {
            "static" => Ok(Linkage::Static),
            "shared" => Ok(Linkage::Shared),
            "api" => Ok(Linkage::Api),
            other => Err(ResolveError::InvalidLinkage(other.to_string())),
        }
    }

    fn matches_axes(&self, binary: &BinaryVariant) -> bool {
        axis_matches(self.flavor.as_deref(), &binary.flavor)
            && axis_matches(self.platform.as_deref(), &binary.platform)
            && axis_matches(self.build_type.as_deref(), &binary.build_type)
    }
}

fn axis_matches(requested: Option<&str>, actual: &str) -> bool {
    requested.is_none_or(|value| value == actual)
}

/// The binaries of `component` that satisfy `criteria`.
///
/// Requesting `api` matches shared binaries and yields their header-only
/// view. No binary matching the criteria is not an error here; an empty
/// result lets the caller report all candidates at once.
pub fn select_variants(
    component: &VariantComponent,
    criteria: &VariantCriteria,
) -> Vec<BinaryVariant> {
    let linkage = criteria.linkage.unwrap_or(Linkage::Shared);
    component
        .variants()
        .iter()
        .filter(|binary| criteria.matches_axes(binary))
        .filter_map(|binary| match (linkage, binary.linkage) {
            (Linkage::Api, Linkage::Shared) => Some(binary.to_api()),
            (requested, actual) if requested == actual => Some(binary.clone()),
            _ => None,
        })
        .collect()
}
