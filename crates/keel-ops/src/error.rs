//! Error types for build operation descriptors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OperationError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// A descriptor was built without an id assigned by the executor.
    #[error("operation '{display_name}' has no id assigned")]
    MissingId { display_name: String },

    /// Descriptors must carry a non-empty display name.
    #[error("operation descriptor has an empty display name")]
    EmptyDisplayName,
}
