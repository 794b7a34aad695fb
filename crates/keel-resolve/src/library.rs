//! Local library model and the resolver chain that finds candidates.

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactIdentity, ArtifactSet, ResolvedArtifact, ResolvedArtifactSet, ResolvedVariant};
use crate::component::{ComponentId, LibraryBinaryId};
use crate::files::Usage;

/// How a library binary is linked into its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Static,
    Shared,
    /// Derived pseudo-variant of a shared library that exposes only its
    /// header roots; link and runtime file sets are empty.
    Api,
}

impl Linkage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Shared => "shared",
            Self::Api => "api",
        }
    }
}

/// One buildable binary of a library: linkage plus the flavor, platform and
/// build-type axes, and the files each usage consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryVariant {
    pub id: LibraryBinaryId,
    pub linkage: Linkage,
    pub flavor: String,
    pub platform: String,
    pub build_type: String,
    pub header_dirs: Vec<PathBuf>,
    pub link_files: Vec<PathBuf>,
    pub runtime_files: Vec<PathBuf>,
    /// Task paths producing this binary's outputs.
    pub build_dependencies: Vec<String>,
}

impl BinaryVariant {
    /// The api view of a shared binary: headers only, nothing to link or run.
    pub fn to_api(&self) -> BinaryVariant {
        BinaryVariant {
            id: LibraryBinaryId::new(
                self.id.project.clone(),
                self.id.library.clone(),
                "api",
            ),
            linkage: Linkage::Api,
            flavor: self.flavor.clone(),
            platform: self.platform.clone(),
            build_type: self.build_type.clone(),
            header_dirs: self.header_dirs.clone(),
            link_files: Vec::new(),
            runtime_files: Vec::new(),
            build_dependencies: self.build_dependencies.clone(),
        }
    }

    pub fn files_for(&self, usage: Usage) -> &[PathBuf] {
        match usage {
            Usage::Compile => &self.header_dirs,
            Usage::Link => &self.link_files,
            Usage::Runtime => &self.runtime_files,
        }
    }

    /// Adapt this binary into the artifact set attached to a graph edge:
    /// one variant per usage, each carrying that usage's files.
    pub fn to_artifact_set(&self, id: usize) -> ArtifactSet {
        let component = ComponentId::LibraryBinary(self.id.clone());
        let variants = [Usage::Compile, Usage::Link, Usage::Runtime]
            .into_iter()
            .map(|usage| {
                let artifacts = self
                    .files_for(usage)
                    .iter()
                    .map(|file| {
                        ResolvedArtifact::new(
                            ArtifactIdentity::new(component.clone(), usage.artifact_kind()),
                            file.clone(),
                        )
                    })
                    .collect();
                ResolvedVariant::new(
                    usage.name(),
                    ResolvedArtifactSet::Artifacts {
                        artifacts,
                        build_dependencies: self.build_dependencies.clone(),
                    },
                )
            })
            .collect();
        ArtifactSet::new(id, component, variants)
    }
}

/// A named library with its buildable variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantComponent {
    name: String,
    variants: Vec<BinaryVariant>,
}

impl VariantComponent {
    pub fn new(name: impl Into<String>, variants: Vec<BinaryVariant>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[BinaryVariant] {
        &self.variants
    }
}

/// A repository of prebuilt libraries declared on a project.
#[derive(Debug, Default)]
pub struct PrebuiltRepository {
    name: String,
    libraries: FxHashMap<String, Arc<VariantComponent>>,
}

impl PrebuiltRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            libraries: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_library(&mut self, library: VariantComponent) {
        self.libraries
            .insert(library.name().to_string(), Arc::new(library));
    }

    pub fn resolve_library(&self, name: &str) -> Option<Arc<VariantComponent>> {
        self.libraries.get(name).cloned()
    }
}

/// The per-project model the local resolvers search.
#[derive(Debug, Default)]
pub struct ProjectModel {
    components: FxHashMap<String, Arc<VariantComponent>>,
    prebuilt_repositories: Vec<PrebuiltRepository>,
}

impl ProjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, component: VariantComponent) {
        self.components
            .insert(component.name().to_string(), Arc::new(component));
    }

    pub fn component(&self, name: &str) -> Option<Arc<VariantComponent>> {
        self.components.get(name).cloned()
    }

    pub fn add_prebuilt_repository(&mut self, repository: PrebuiltRepository) {
        self.prebuilt_repositories.push(repository);
    }

    pub fn prebuilt_repositories(&self) -> &[PrebuiltRepository] {
        &self.prebuilt_repositories
    }
}

/// One strategy for resolving a library name against a project model.
pub trait LocalLibraryResolver: Send + Sync {
    fn resolve_candidates(
        &self,
        project_model: &ProjectModel,
        library_name: &str,
    ) -> Vec<Arc<VariantComponent>>;
}

/// Resolves ordinary components registered on the project model.
#[derive(Debug, Default)]
pub struct ProjectModelResolver;

impl LocalLibraryResolver for ProjectModelResolver {
    fn resolve_candidates(
        &self,
        project_model: &ProjectModel,
        library_name: &str,
    ) -> Vec<Arc<VariantComponent>> {
        project_model.component(library_name).into_iter().collect()
    }
}

/// Resolves against the prebuilt-library repositories declared on the project.
#[derive(Debug, Default)]
pub struct PrebuiltLibraryResolver;

impl LocalLibraryResolver for PrebuiltLibraryResolver {
    fn resolve_candidates(
        &self,
        project_model: &ProjectModel,
        library_name: &str,
    ) -> Vec<Arc<VariantComponent>> {
        project_model
            .prebuilt_repositories()
            .iter()
            .filter_map(|repository| repository.resolve_library(library_name))
            .collect()
    }
}

/// Concatenates the candidates of several resolution strategies, in order.
pub struct ChainLocalLibraryResolver {
    resolvers: Vec<Box<dyn LocalLibraryResolver>>,
}

impl ChainLocalLibraryResolver {
    pub fn new(resolvers: Vec<Box<dyn LocalLibraryResolver>>) -> Self {
        Self { resolvers }
    }

    /// The standard chain: ordinary local components, then prebuilt libraries.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ProjectModelResolver),
            Box::new(PrebuiltLibraryResolver),
        ])
    }
}

impl LocalLibraryResolver for ChainLocalLibraryResolver {
    fn resolve_candidates(
        &self,
        project_model: &ProjectModel,
        library_name: &str,
    ) -> Vec<Arc<VariantComponent>> {
        self.resolvers
            .iter()
            .flat_map(|resolver| resolver.resolve_candidates(project_model, library_name))
            .collect()
    }
}
