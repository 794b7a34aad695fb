//! Aggregation of artifact sets visited during one resolve.
//!
//! [`ResolvedArtifactsBuilder`] collects artifact sets and their build
//! eligibility while the graph is walked; [`VisitedArtifacts`] is the
//! immutable, id-indexed result that survives the graph.

use rustc_hash::FxHashSet;

use crate::artifact::{ArtifactSet, ResolvedArtifactSet, ResolvedVariant};
use crate::component::{BuildId, ComponentId};
use crate::graph::DependencyGraphNode;
use crate::visitor::DependencyArtifactsVisitor;

/// Collects all artifacts and their build dependencies.
#[derive(Debug)]
pub struct ResolvedArtifactsBuilder {
    build_project_dependencies: bool,
    current_build: BuildId,
    artifact_sets: Vec<ArtifactSet>,
    buildable_ids: FxHashSet<usize>,
    max_id: usize,
}

impl ResolvedArtifactsBuilder {
    pub fn new(build_project_dependencies: bool, current_build: BuildId) -> Self {
        Self {
            build_project_dependencies,
            current_build,
            artifact_sets: Vec::new(),
            buildable_ids: FxHashSet::default(),
            max_id: 0,
        }
    }

    /// Materialize the dense id-indexed table. Every collected set is
    /// snapshotted so the result holds no reference back into the graph.
    pub fn complete(self) -> VisitedArtifacts {
        let mut artifacts_by_id: Vec<Option<ArtifactSet>> = vec![None; self.max_id + 1];
        for set in &self.artifact_sets {
            artifacts_by_id[set.id()] = Some(set.snapshot());
        }
        VisitedArtifacts {
            artifacts_by_id,
            buildable_ids: self.buildable_ids,
        }
    }
}

impl DependencyArtifactsVisitor for ResolvedArtifactsBuilder {
    fn visit_artifacts(
        &mut self,
        from: &DependencyGraphNode,
        to: &DependencyGraphNode,
        artifacts: &ArtifactSet,
    ) {
        let id = artifacts.id();
        if id > self.max_id {
            self.max_id = id;
        }
        self.artifact_sets.push(artifacts.clone());

        if !self.build_project_dependencies {
            return;
        }
        // First eligible edge wins; the flag is never cleared within a resolve.
        if self.buildable_ids.contains(&id) {
            return;
        }
        if !to.metadata().is_local() {
            return;
        }
        if let Some(build) = from.component().project_build() {
            // Leaves out build dependencies that would put a cycle in the
            // current build's task graph; cross-build dependencies are wired
            // out-of-band by the included-build controllers. Known to be an
            // approximation: it can also drop dependencies that would have
            // been safe to keep.
            if *build != self.current_build {
                return;
            }
        }
        self.buildable_ids.insert(id);
    }
}

/// The immutable outcome of visiting one resolved graph's artifacts.
///
/// Built by exactly one thread during the resolve; safe to share read-only
/// afterwards.
#[derive(Debug)]
pub struct VisitedArtifacts {
    artifacts_by_id: Vec<Option<ArtifactSet>>,
    buildable_ids: FxHashSet<usize>,
}

impl VisitedArtifacts {
    /// Size of the id table, `max(id) + 1`.
    pub fn len(&self) -> usize {
        self.artifacts_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts_by_id.iter().all(Option::is_none)
    }

    pub fn artifact_set(&self, id: usize) -> Option<&ArtifactSet> {
        self.artifacts_by_id.get(id).and_then(Option::as_ref)
    }

    pub fn is_buildable(&self, id: usize) -> bool {
        self.buildable_ids.contains(&id)
    }

    /// Narrow to the components accepted by `component_filter` and pick one
    /// variant per artifact set.
    ///
    /// The selector returns the index of the chosen variant, or `None` for an
    /// explicitly empty selection. Sets whose id was never marked buildable
    /// are wrapped so their build dependencies stay hidden.
    pub fn select<F, S>(&self, component_filter: F, variant_selector: S) -> SelectedArtifacts
    where
        F: Fn(&ComponentId) -> bool,
        S: Fn(&[ResolvedVariant]) -> Option<usize>,
    {
        let mut all: Vec<ResolvedArtifactSet> = Vec::new();
        let mut by_id: Vec<Option<ResolvedArtifactSet>> = vec![None; self.artifacts_by_id.len()];

        for (id, slot) in self.artifacts_by_id.iter().enumerate() {
            let Some(set) = slot else { continue };
            if !component_filter(set.component()) {
                continue;
            }
            let resolved = match variant_selector(set.variants()) {
                None => ResolvedArtifactSet::Empty,
                Some(index) => {
                    let mut resolved = set.variants()[index].artifacts().clone();
                    if !self.buildable_ids.contains(&set.id()) {
                        resolved = ResolvedArtifactSet::without_build_dependencies(resolved);
                    }
                    all.push(resolved.clone());
                    resolved
                }
            };
            by_id[id] = Some(resolved);
        }

        SelectedArtifacts {
            all: ResolvedArtifactSet::composite_of(all),
            by_id,
        }
    }
}

/// Result of selecting one variant per visited artifact set.
#[derive(Debug)]
pub struct SelectedArtifacts {
    all: ResolvedArtifactSet,
    by_id: Vec<Option<ResolvedArtifactSet>>,
}

impl SelectedArtifacts {
    /// Union of every selected set, in id order.
    pub fn artifacts(&self) -> &ResolvedArtifactSet {
        &self.all
    }

    /// The selection for one artifact-set id, if its component passed the filter.
    pub fn artifacts_for(&self, id: usize) -> Option<&ResolvedArtifactSet> {
        self.by_id.get(id).and_then(Option::as_ref)
    }
}
