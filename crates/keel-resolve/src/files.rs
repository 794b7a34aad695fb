//! Usage kinds and the file validation applied when artifacts are consumed.

use std::path::Path;

use crate::artifact::ArtifactIdentity;
use crate::error::{ResolveError, Result};

/// How a consumer uses the files of a resolved library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    /// Header roots on the compile path. Directories may not exist yet when
    /// they are produced by a task that has not run, so no existence check.
    Compile,
    /// The file handed to the linker.
    Link,
    /// The file loaded at runtime.
    Runtime,
}

impl Usage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Link => "link",
            Self::Runtime => "runtime",
        }
    }

    /// Artifact name used in identities and error messages.
    pub fn artifact_kind(self) -> &'static str {
        match self {
            Self::Compile => "headers",
            Self::Link => "link file",
            Self::Runtime => "runtime file",
        }
    }

    /// Link and runtime files must exist on disk when resolved; compile
    /// header roots are allowed to be created later.
    pub fn validates_files(self) -> bool {
        matches!(self, Self::Link | Self::Runtime)
    }
}

/// Checks a usage's files as they are handed to a consumer.
#[derive(Debug, Clone, Copy)]
pub struct ValidatingFileSet {
    usage: Usage,
}

impl ValidatingFileSet {
    pub fn new(usage: Usage) -> Self {
        Self { usage }
    }

    pub fn validate(&self, identity: &ArtifactIdentity, file: &Path) -> Result<()> {
        if self.usage.validates_files() && !file.exists() {
            return Err(ResolveError::MissingArtifactFile {
                file: file.to_path_buf(),
                identity: identity.to_string(),
                usage: self.usage.name().to_string(),
            });
        }
        Ok(())
    }
}
