//! Dependency resolution for the keel build engine.
//!
//! Covers the data model of resolved graphs ([`graph`], [`component`],
//! [`artifact`]), one-pass aggregation of artifact sets and their build
//! eligibility ([`results`]), variant selection for native library binaries
//! ([`variant`], [`library`]), usage-based file validation ([`files`]) and
//! dynamic version listings ([`versions`]).

pub mod artifact;
pub mod component;
pub mod error;
pub mod files;
pub mod graph;
pub mod library;
pub mod metadata;
pub mod resolver;
pub mod results;
pub mod variant;
pub mod versions;
pub mod visitor;

pub use artifact::{
    ArtifactIdentity, ArtifactSet, ResolvedArtifact, ResolvedArtifactSet, ResolvedVariant,
};
pub use component::{BuildId, ComponentId, LibraryBinaryId};
pub use error::{LibraryResolveError, ResolveError, Result};
pub use files::{Usage, ValidatingFileSet};
pub use graph::{DependencyGraphEdge, DependencyGraphNode, NodeId, ResolvedGraph};
pub use library::{
    BinaryVariant, ChainLocalLibraryResolver, Linkage, LocalLibraryResolver,
    PrebuiltLibraryResolver, PrebuiltRepository, ProjectModel, ProjectModelResolver,
    VariantComponent,
};
pub use metadata::ConfigurationMetadata;
pub use resolver::{LibraryDependencyResolver, LibraryRequirement, ResolveResult};
pub use results::{ResolvedArtifactsBuilder, SelectedArtifacts, VisitedArtifacts};
pub use variant::{select_variants, VariantCriteria};
pub use versions::{DynamicVersionSupplier, ModuleVersionSelector, VersionListing, VersionListingBuilder};
pub use visitor::{DependencyArtifactsVisitor, DependencyGraphVisitor};
