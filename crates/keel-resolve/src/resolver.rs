//! One-pass resolve result collection, and resolution of library
//! dependencies against the local resolver chain.

use rustc_hash::FxHashSet;

use crate::artifact::ArtifactSet;
use crate::component::BuildId;
use crate::error::{LibraryResolveError, ResolveError};
use crate::graph::DependencyGraphNode;
use crate::library::{BinaryVariant, LocalLibraryResolver, ProjectModel};
use crate::results::{ResolvedArtifactsBuilder, VisitedArtifacts};
use crate::variant::{select_variants, VariantCriteria};
use crate::visitor::{DependencyArtifactsVisitor, DependencyGraphVisitor};

/// Collects everything one graph walk produces: the task dependencies of
/// local nodes, every edge failure, and the aggregated artifact sets.
///
/// A single instance rides one `ResolvedGraph::visit` call and is then
/// consumed.
pub struct ResolveResult {
    task_dependencies: FxHashSet<String>,
    failures: Vec<ResolveError>,
    artifacts: Option<ResolvedArtifactsBuilder>,
    visited: Option<VisitedArtifacts>,
}

impl ResolveResult {
    pub fn new(build_project_dependencies: bool, current_build: BuildId) -> Self {
        Self {
            task_dependencies: FxHashSet::default(),
            failures: Vec::new(),
            artifacts: Some(ResolvedArtifactsBuilder::new(
                build_project_dependencies,
                current_build,
            )),
            visited: None,
        }
    }

    /// Task paths that must run before the resolved artifacts exist, from
    /// every local node in the graph.
    pub fn task_dependencies(&self) -> &FxHashSet<String> {
        &self.task_dependencies
    }

    pub fn failures(&self) -> &[ResolveError] {
        &self.failures
    }

    /// All edge failures rolled into one error, if any edge failed.
    pub fn failure(&self, requested: &str) -> Option<LibraryResolveError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(LibraryResolveError::new(
            format!("Could not resolve all dependencies for '{requested}'"),
            self.failures.clone(),
        ))
    }

    /// The aggregated artifacts. Only present once the walk has finished.
    pub fn visited_artifacts(&self) -> Option<&VisitedArtifacts> {
        self.visited.as_ref()
    }

    pub fn into_visited_artifacts(self) -> Option<VisitedArtifacts> {
        self.visited
    }
}

impl DependencyGraphVisitor for ResolveResult {
    fn visit_node(&mut self, node: &DependencyGraphNode) {
        for task in node.metadata().build_dependencies() {
            self.task_dependencies.insert(task.clone());
        }
    }

    fn visit_edge(&mut self, node: &DependencyGraphNode) {
        for edge in node.outgoing_edges() {
            if let Some(failure) = edge.failure() {
                self.failures.push(failure.clone());
            }
        }
    }
}

impl DependencyArtifactsVisitor for ResolveResult {
    fn visit_artifacts(
        &mut self,
        from: &DependencyGraphNode,
        to: &DependencyGraphNode,
        artifacts: &ArtifactSet,
    ) {
        if let Some(builder) = self.artifacts.as_mut() {
            builder.visit_artifacts(from, to, artifacts);
        }
    }

    fn finish_artifacts(&mut self) {
        if let Some(builder) = self.artifacts.take() {
            self.visited = Some(builder.complete());
        }
    }
}

/// A library dependency as declared: the target project (empty for the
/// consumer's own project), the library name, and the requested variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRequirement {
    pub project: String,
    pub library: String,
    pub criteria: VariantCriteria,
}

/// Resolves library requirements to binaries, collecting every failure so
/// a single resolve reports them all together.
pub struct LibraryDependencyResolver<R> {
    local_resolver: R,
}

impl<R: LocalLibraryResolver> LibraryDependencyResolver<R> {
    pub fn new(local_resolver: R) -> Self {
        Self { local_resolver }
    }

    /// Resolve one requirement against a project's model.
    pub fn resolve(
        &self,
        project_model: &ProjectModel,
        requirement: &LibraryRequirement,
    ) -> Result<Vec<BinaryVariant>, ResolveError> {
        let candidates = self
            .local_resolver
            .resolve_candidates(project_model, &requirement.library);
        match candidates.len() {
            0 => Err(ResolveError::LibraryNotFound {
                project: requirement.project.clone(),
                library: requirement.library.clone(),
            }),
            1 => Ok(select_variants(&candidates[0], &requirement.criteria)),
            _ => Err(ResolveError::AmbiguousDependency {
                selector: requirement.library.clone(),
                candidates: candidates.iter().map(|c| c.name().to_string()).collect(),
            }),
        }
    }

    /// Resolve a batch of requirements, aggregating every failure into one
    /// error instead of stopping at the first.
    pub fn resolve_all(
        &self,
        project_model: &ProjectModel,
        consumer: &str,
        requirements: &[LibraryRequirement],
    ) -> Result<Vec<BinaryVariant>, LibraryResolveError> {
        let mut resolved = Vec::new();
        let mut failures = Vec::new();
        for requirement in requirements {
            match self.resolve(project_model, requirement) {
                Ok(binaries) => resolved.extend(binaries),
                Err(failure) => failures.push(failure),
            }
        }
        if failures.is_empty() {
            Ok(resolved)
        } else {
            tracing::debug!(
                consumer,
                failures = failures.len(),
                "library resolution failed"
            );
            Err(LibraryResolveError::new(
                format!("Could not resolve all dependencies for '{consumer}'"),
                failures,
            ))
        }
    }
}
