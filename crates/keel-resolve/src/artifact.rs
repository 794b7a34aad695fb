//! Resolved artifact collections.
//!
//! An [`ArtifactSet`] identifies the bundle of artifact variants attached to
//! one graph edge. It carries a small dense id, stable for the duration of a
//! resolution, so that results can be stored in a flat table indexed by id.
//! [`ResolvedArtifactSet`] is the concrete, selection-time artifact
//! collection, including the wrapper that suppresses build-dependency
//! propagation across composite-build boundaries.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::component::ComponentId;

/// Identity of one resolved artifact, used in failure messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIdentity {
    pub component: ComponentId,
    pub name: String,
}

impl ArtifactIdentity {
    pub fn new(component: ComponentId, name: impl Into<String>) -> Self {
        Self {
            component,
            name: name.into(),
        }
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.component)
    }
}

/// One producible file of a resolved component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub identity: ArtifactIdentity,
    pub file: PathBuf,
}

impl ResolvedArtifact {
    pub fn new(identity: ArtifactIdentity, file: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            file: file.into(),
        }
    }
}

/// One selectable variant of an artifact set, e.g. the `compile`, `link` or
/// `runtime` usage of a library binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariant {
    name: String,
    artifacts: ResolvedArtifactSet,
}

impl ResolvedVariant {
    pub fn new(name: impl Into<String>, artifacts: ResolvedArtifactSet) -> Self {
        Self {
            name: name.into(),
            artifacts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifacts(&self) -> &ResolvedArtifactSet {
        &self.artifacts
    }
}

/// A lazily-buildable collection of resolved artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArtifactSet {
    /// No artifacts; selecting no variant resolves to this, not an error.
    Empty,
    /// Concrete artifacts plus the task paths that produce them.
    Artifacts {
        artifacts: Vec<ResolvedArtifact>,
        build_dependencies: Vec<String>,
    },
    /// Union of several sets, in selection order.
    Composite(Vec<ResolvedArtifactSet>),
    /// Wrapper that hides the build dependencies of the inner set.
    ///
    /// Used for artifact sets whose producing project must not be wired into
    /// the current build's task graph (cross-build edges in a composite).
    NoBuildDependencies(Box<ResolvedArtifactSet>),
}

impl ResolvedArtifactSet {
    pub fn artifacts_only(artifacts: Vec<ResolvedArtifact>) -> Self {
        Self::Artifacts {
            artifacts,
            build_dependencies: Vec::new(),
        }
    }

    /// Wrap a set so its build dependencies are not visible. Empty stays empty.
    pub fn without_build_dependencies(set: ResolvedArtifactSet) -> Self {
        match set {
            Self::Empty => Self::Empty,
            other => Self::NoBuildDependencies(Box::new(other)),
        }
    }

    /// Union of the given sets. Zero sets collapse to `Empty`, one set is
    /// returned as-is.
    pub fn composite_of(mut sets: Vec<ResolvedArtifactSet>) -> Self {
        match sets.len() {
            0 => Self::Empty,
            1 => sets.remove(0),
            _ => Self::Composite(sets),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Artifacts { artifacts, .. } => artifacts.is_empty(),
            Self::Composite(sets) => sets.iter().all(Self::is_empty),
            Self::NoBuildDependencies(inner) => inner.is_empty(),
        }
    }

    /// All artifacts of this set, in declaration order.
    pub fn artifacts(&self) -> Vec<&ResolvedArtifact> {
        let mut collected = Vec::new();
        self.collect_artifacts(&mut collected);
        collected
    }

    fn collect_artifacts<'a>(&'a self, into: &mut Vec<&'a ResolvedArtifact>) {
        match self {
            Self::Empty => {}
            Self::Artifacts { artifacts, .. } => into.extend(artifacts.iter()),
            Self::Composite(sets) => {
                for set in sets {
                    set.collect_artifacts(into);
                }
            }
            Self::NoBuildDependencies(inner) => inner.collect_artifacts(into),
        }
    }

    /// Task paths required to produce these artifacts. Dependencies under a
    /// `NoBuildDependencies` wrapper are pruned.
    pub fn build_dependencies(&self) -> Vec<&str> {
        let mut collected = Vec::new();
        self.collect_build_dependencies(&mut collected);
        collected
    }

    fn collect_build_dependencies<'a>(&'a self, into: &mut Vec<&'a str>) {
        match self {
            Self::Empty | Self::NoBuildDependencies(_) => {}
            Self::Artifacts {
                build_dependencies, ..
            } => into.extend(build_dependencies.iter().map(String::as_str)),
            Self::Composite(sets) => {
                for set in sets {
                    set.collect_build_dependencies(into);
                }
            }
        }
    }
}

/// The artifact bundle attached to one dependency graph edge.
///
/// Ids are assigned densely per resolution, so `max(id) + 1` bounds the size
/// of a flat lookup table. The variant list is shared; [`ArtifactSet::snapshot`]
/// produces a copy that is safe to retain after the live graph is discarded.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    id: usize,
    component: ComponentId,
    variants: Arc<Vec<ResolvedVariant>>,
}

impl ArtifactSet {
    pub fn new(id: usize, component: ComponentId, variants: Vec<ResolvedVariant>) -> Self {
        Self {
            id,
            component,
            variants: Arc::new(variants),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    pub fn variants(&self) -> &[ResolvedVariant] {
        &self.variants
    }

    /// An immutable copy that holds no reference back into the graph.
    pub fn snapshot(&self) -> ArtifactSet {
        ArtifactSet {
            id: self.id,
            component: self.component.clone(),
            variants: Arc::clone(&self.variants),
        }
    }
}
