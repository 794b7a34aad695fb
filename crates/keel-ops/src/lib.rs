//! Build operations for the keel build engine.
//!
//! Every significant piece of work a build does runs as an operation with
//! an id, a parent and a display name. The [`executor`] assigns ids and
//! emits lifecycle events; the [`bus`] fans them out to unfiltered
//! listeners and to filtered pipes that re-parent events into a consistent
//! tree.

pub mod bus;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod executor;

pub use bus::{reduce_types, OperationEventBus, OperationListener, Subscription};
pub use descriptor::{
    OperationDescriptor, OperationDescriptorBuilder, OperationDetail, OperationId, OperationType,
};
pub use error::{OperationError, Result};
pub use event::{now_millis, OperationFailure, OperationFinished, OperationStarted};
pub use executor::{OperationExecutor, RunnableOperation};
