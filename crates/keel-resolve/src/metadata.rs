use serde::{Deserialize, Serialize};

/// Metadata of the configuration a graph node resolves to.
///
/// A tagged variant rather than a downcast hierarchy: the aggregator
/// switches on the discriminator instead of inspecting concrete types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationMetadata {
    /// An in-graph, buildable configuration of a local project.
    Local {
        /// Task paths that must run before this configuration's artifacts exist.
        build_dependencies: Vec<String>,
    },
    /// A configuration of an external component; nothing to build locally.
    External,
}

impl ConfigurationMetadata {
    pub fn local(build_dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Local {
            build_dependencies: build_dependencies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Direct build dependencies; empty for external configurations.
    pub fn build_dependencies(&self) -> &[String] {
        match self {
            Self::Local { build_dependencies } => build_dependencies,
            Self::External => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_metadata_exposes_build_dependencies() {
        let metadata = ConfigurationMetadata::local([":core:compile", ":core:link"]);
        assert!(metadata.is_local());
        assert_eq!(
            metadata.build_dependencies(),
            &[":core:compile".to_string(), ":core:link".to_string()]
        );
    }

    #[test]
    fn external_metadata_has_none() {
        assert!(!ConfigurationMetadata::External.is_local());
        assert!(ConfigurationMetadata::External.build_dependencies().is_empty());
    }
}
