use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one build participating in a composite.
///
/// The root build and every included build get their own id; project
/// components carry the id of the build that owns them so that resolution
/// can tell same-build edges apart from cross-build edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one library binary variant within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryBinaryId {
    pub project: String,
    pub library: String,
    pub variant: String,
}

impl LibraryBinaryId {
    pub fn new(
        project: impl Into<String>,
        library: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            library: library.into(),
            variant: variant.into(),
        }
    }
}

impl fmt::Display for LibraryBinaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.library, self.variant)
    }
}

/// Identifies the component that owns a resolved graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    /// A project in some build of the composite.
    Project { build: BuildId, path: String },
    /// An external module from a repository.
    Module {
        group: String,
        name: String,
        version: String,
    },
    /// A concrete library binary variant.
    LibraryBinary(LibraryBinaryId),
}

impl ComponentId {
    pub fn project(build: BuildId, path: impl Into<String>) -> Self {
        Self::Project {
            build,
            path: path.into(),
        }
    }

    pub fn module(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::Module {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn is_project(&self) -> bool {
        matches!(self, Self::Project { .. })
    }

    /// The owning build, for project components only.
    pub fn project_build(&self) -> Option<&BuildId> {
        match self {
            Self::Project { build, .. } => Some(build),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project { build, path } => write!(f, "project {path} (build {build})"),
            Self::Module {
                group,
                name,
                version,
            } => write!(f, "{group}:{name}:{version}"),
            Self::LibraryBinary(id) => write!(f, "library binary {id}"),
        }
    }
}
