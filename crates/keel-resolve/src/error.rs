//! Error types for dependency resolution.

use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// A single underlying resolution failure.
///
/// These are collected on graph edges during a resolve and batched into one
/// [`LibraryResolveError`] at the end; they are never thrown one by one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// User requested an unrecognized linkage token.
    #[error("invalid linkage '{0}' requested for library dependency")]
    InvalidLinkage(String),

    /// No candidate component for the requested library name.
    #[error("could not find library '{library}' in project '{project}'")]
    LibraryNotFound { project: String, library: String },

    /// A module version could not be resolved against any repository.
    #[error("could not resolve module {group}:{name}:{version}")]
    ModuleVersionNotFound {
        group: String,
        name: String,
        version: String,
    },

    /// A dependency selector matched more than one candidate.
    #[error("dependency '{selector}' is ambiguous: candidates are {}", candidates.join(", "))]
    AmbiguousDependency {
        selector: String,
        candidates: Vec<String>,
    },

    /// A resolved artifact file is missing on disk.
    #[error("artifact {} does not exist for {identity} when resolving {usage}", file.display())]
    MissingArtifactFile {
        file: PathBuf,
        identity: String,
        usage: String,
    },
}

/// Aggregate of every underlying failure from one resolve.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LibraryResolveError {
    message: String,
    causes: Vec<ResolveError>,
}

impl LibraryResolveError {
    pub fn new(summary: impl Into<String>, causes: Vec<ResolveError>) -> Self {
        let summary = summary.into();
        let mut message = summary;
        for cause in &causes {
            let _ = write!(message, "\n  - {cause}");
        }
        Self { message, causes }
    }

    pub fn causes(&self) -> &[ResolveError] {
        &self.causes
    }
}
