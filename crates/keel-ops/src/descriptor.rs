//! Build operation identity and descriptors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{OperationError, Result};

/// Identifier of one build operation, unique within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a build operation, used to filter event subscriptions.
///
/// Categories form a partial order: subscribing to a broad category also
/// receives operations of the categories it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationType {
    Build,
    Configuration,
    ProjectConfiguration,
    TaskExecution,
    Tasks,
    Tests,
}

impl OperationType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Configuration => "configuration",
            Self::ProjectConfiguration => "project-configuration",
            Self::TaskExecution => "task-execution",
            Self::Tasks => "tasks",
            Self::Tests => "tests",
        }
    }

    /// Whether an operation of type `other` satisfies a subscription to
    /// `self`.
    pub fn covers(self, other: OperationType) -> bool {
        if self == other {
            return true;
        }
        match self {
            Self::Build => true,
            Self::Tasks => matches!(other, Self::TaskExecution | Self::Tests),
            Self::Configuration => matches!(other, Self::ProjectConfiguration),
            _ => false,
        }
    }
}

/// Arbitrary payload attached to an operation by whoever ran it.
pub type OperationDetail = Arc<dyn Any + Send + Sync>;

/// Describes one build operation: its identity, position in the operation
/// tree, display name, declared categories and optional detail.
///
/// An operation may declare several categories; an event filter matches if
/// it covers any of them. An operation with none never matches a filter.
#[derive(Clone)]
pub struct OperationDescriptor {
    id: OperationId,
    parent_id: Option<OperationId>,
    display_name: String,
    operation_types: Vec<OperationType>,
    detail: Option<OperationDetail>,
}

impl OperationDescriptor {
    pub fn builder(display_name: impl Into<String>) -> OperationDescriptorBuilder {
        OperationDescriptorBuilder {
            id: None,
            parent_id: None,
            display_name: display_name.into(),
            operation_types: Vec::new(),
            detail: None,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn parent_id(&self) -> Option<OperationId> {
        self.parent_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn operation_types(&self) -> &[OperationType] {
        &self.operation_types
    }

    pub fn detail(&self) -> Option<&OperationDetail> {
        self.detail.as_ref()
    }

    /// The same descriptor re-parented, as seen through a filtered pipe.
    pub fn with_parent_id(&self, parent_id: Option<OperationId>) -> OperationDescriptor {
        OperationDescriptor {
            parent_id,
            ..self.clone()
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("display_name", &self.display_name)
            .field("operation_types", &self.operation_types)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct OperationDescriptorBuilder {
    id: Option<OperationId>,
    parent_id: Option<OperationId>,
    display_name: String,
    operation_types: Vec<OperationType>,
    detail: Option<OperationDetail>,
}

impl OperationDescriptorBuilder {
    pub fn id(mut self, id: OperationId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn parent_id(mut self, parent_id: Option<OperationId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Declare one more category for this operation.
    pub fn operation_type(mut self, operation_type: OperationType) -> Self {
        if !self.operation_types.contains(&operation_type) {
            self.operation_types.push(operation_type);
        }
        self
    }

    pub fn detail(mut self, detail: OperationDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn build(self) -> Result<OperationDescriptor> {
        if self.display_name.is_empty() {
            return Err(OperationError::EmptyDisplayName);
        }
        let Some(id) = self.id else {
            return Err(OperationError::MissingId {
                display_name: self.display_name,
            });
        };
        Ok(OperationDescriptor {
            id,
            parent_id: self.parent_id,
            display_name: self.display_name,
            operation_types: self.operation_types,
            detail: self.detail,
        })
    }
}
