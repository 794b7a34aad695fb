//! Runs build operations, assigning ids and emitting lifecycle events.

use std::cell::RefCell;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bus::OperationEventBus;
use crate::descriptor::{OperationDescriptorBuilder, OperationId};
use crate::error::Result;
use crate::event::{OperationFailure, OperationFinished, OperationStarted};

thread_local! {
    static CURRENT_OPERATION: RefCell<Vec<OperationId>> = const { RefCell::new(Vec::new()) };
}

/// Pops the thread's operation stack even if the operation panics.
struct StackEntry;

impl StackEntry {
    fn push(id: OperationId) -> Self {
        CURRENT_OPERATION.with(|stack| stack.borrow_mut().push(id));
        Self
    }
}

impl Drop for StackEntry {
    fn drop(&mut self) {
        CURRENT_OPERATION.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A unit of work that runs as one build operation.
pub trait RunnableOperation {
    /// Descriptor for this operation; the executor fills in id and parent.
    fn description(&self) -> OperationDescriptorBuilder;

    fn run(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>>;
}

/// Assigns operation ids, maintains the per-thread operation stack and
/// emits started/finished events around each operation.
pub struct OperationExecutor {
    bus: Arc<OperationEventBus>,
    next_id: AtomicU64,
}

impl OperationExecutor {
    pub fn new(bus: Arc<OperationEventBus>) -> Self {
        Self {
            bus,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn bus(&self) -> &Arc<OperationEventBus> {
        &self.bus
    }

    /// The operation currently running on this thread, if any. New
    /// operations are parented to it.
    pub fn current_operation() -> Option<OperationId> {
        CURRENT_OPERATION.with(|stack| stack.borrow().last().copied())
    }

    /// Run `operation`, emitting a start event before and a finish event
    /// after, whether it succeeds or fails.
    pub fn run<O: RunnableOperation>(
        &self,
        operation: &mut O,
    ) -> std::result::Result<(), OperationFailure> {
        let descriptor = self
            .describe(operation)
            .map_err(|error| -> OperationFailure { Arc::new(error) })?;
        let started = OperationStarted::now();
        tracing::debug!(operation = descriptor.display_name(), "operation started");
        self.bus.started(&descriptor, &started);

        let outcome = {
            let _entry = StackEntry::push(descriptor.id());
            operation.run()
        };
        let failure: Option<OperationFailure> = outcome.err().map(Arc::from);

        self.bus
            .finished(&descriptor, &OperationFinished::now(started, failure.clone()));
        match failure {
            None => Ok(()),
            Some(failure) => {
                tracing::debug!(
                    operation = descriptor.display_name(),
                    error = %failure,
                    "operation failed"
                );
                Err(failure)
            }
        }
    }

    fn describe<O: RunnableOperation>(
        &self,
        operation: &O,
    ) -> Result<crate::descriptor::OperationDescriptor> {
        let id = OperationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        operation
            .description()
            .id(id)
            .parent_id(Self::current_operation())
            .build()
    }
}
