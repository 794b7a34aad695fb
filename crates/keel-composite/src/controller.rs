//! A single included build and the controller that runs it on its own
//! thread.

use std::fmt;
use std::sync::Arc;

use keel_resolve::BuildId;
use parking_lot::{Condvar, Mutex};

use crate::error::BuildFailure;

/// Lets an included build register the builds it depends on while its task
/// graph is being populated, so they get controllers too.
pub trait BuildDiscovery {
    fn ensure_build(&self, build: &BuildId);
}

/// One build included in the composite.
pub trait IncludedBuild: Send + Sync {
    fn name(&self) -> &BuildId;

    /// Schedule whatever tasks other builds have requested so far. Returns
    /// `true` if this call scheduled new work, which may in turn require
    /// another population pass over the composite.
    fn populate_task_graph(&self, discovery: &dyn BuildDiscovery) -> bool;

    fn execute_tasks(&self) -> Result<(), BuildFailure>;
}

#[derive(Debug, Clone, Copy, Default)]
struct ControllerState {
    execution_started: bool,
    stopped: bool,
}

/// Coordinates one included build's controller thread.
///
/// The thread parks in [`IncludedBuildController::run`] until the composite
/// either starts task execution or stops. A controller that is stopped
/// before execution ever starts exits without running anything; a stop
/// after a start does not revoke the start, so the scheduled tasks still
/// run before the thread exits.
pub struct IncludedBuildController {
    build: Arc<dyn IncludedBuild>,
    state: Mutex<ControllerState>,
    state_changed: Condvar,
}

impl fmt::Debug for IncludedBuildController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncludedBuildController")
            .field("build", self.build.name())
            .finish_non_exhaustive()
    }
}

impl IncludedBuildController {
    pub fn new(build: Arc<dyn IncludedBuild>) -> Self {
        Self {
            build,
            state: Mutex::new(ControllerState::default()),
            state_changed: Condvar::new(),
        }
    }

    pub fn build(&self) -> &Arc<dyn IncludedBuild> {
        &self.build
    }

    pub fn populate_task_graph(&self, discovery: &dyn BuildDiscovery) -> bool {
        self.build.populate_task_graph(discovery)
    }

    pub fn start_task_execution(&self) {
        let mut state = self.state.lock();
        if !state.stopped && !state.execution_started {
            state.execution_started = true;
            self.state_changed.notify_all();
        }
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.stopped {
            state.stopped = true;
            self.state_changed.notify_all();
        }
    }

    /// The controller thread body: wait for the go signal, then run the
    /// build's scheduled tasks.
    pub fn run(&self) -> Result<(), BuildFailure> {
        let mut state = self.state.lock();
        while !state.execution_started && !state.stopped {
            self.state_changed.wait(&mut state);
        }
        let go = state.execution_started;
        drop(state);

        if !go {
            return Ok(());
        }
        tracing::debug!(build = %self.build.name(), "executing scheduled tasks");
        self.build.execute_tasks()
    }
}
