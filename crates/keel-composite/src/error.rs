//! Error types for composite build orchestration.

use std::error::Error;

use keel_ops::OperationFailure;
use keel_resolve::BuildId;
use thiserror::Error;

/// What a build hands back when it fails. Boxed at the point of failure,
/// shared as an [`OperationFailure`] once it crosses the event bus.
pub type BuildFailure = Box<dyn Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, CompositeError>;

#[derive(Debug, Error)]
pub enum CompositeError {
    /// A dependency referenced a build the settings never included.
    #[error("included build '{0}' not found")]
    UnknownBuild(BuildId),

    /// The controller thread for an included build could not be spawned.
    #[error("could not start controller thread for build '{build}'")]
    ThreadSpawn {
        build: BuildId,
        #[source]
        source: std::io::Error,
    },

    /// One or more included builds failed; every failure is retained.
    #[error("{} included build(s) failed", failures.len())]
    Stop { failures: Vec<OperationFailure> },

    #[error("invalid engine configuration")]
    Config(#[from] figment::Error),
}
