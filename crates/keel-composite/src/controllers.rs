//! Controller registry for every included build in the composite.

use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keel_ops::{
    OperationDescriptor, OperationDescriptorBuilder, OperationExecutor, OperationFailure,
    OperationType, RunnableOperation,
};
use keel_resolve::BuildId;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::controller::{BuildDiscovery, IncludedBuild, IncludedBuildController};
use crate::error::{BuildFailure, CompositeError, Result};

/// Knows which builds the settings included.
pub trait IncludedBuildRegistry: Send + Sync {
    fn find_build(&self, build: &BuildId) -> Option<Arc<dyn IncludedBuild>>;
}

/// The default registry, filled while settings are loaded.
#[derive(Default)]
pub struct BuildRegistry {
    builds: RwLock<FxHashMap<BuildId, Arc<dyn IncludedBuild>>>,
}

impl BuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, build: Arc<dyn IncludedBuild>) {
        self.builds.write().insert(build.name().clone(), build);
    }
}

impl IncludedBuildRegistry for BuildRegistry {
    fn find_build(&self, build: &BuildId) -> Option<Arc<dyn IncludedBuild>> {
        self.builds.read().get(build).cloned()
    }
}

struct ControllerHandle {
    controller: Arc<IncludedBuildController>,
    join: Mutex<Option<JoinedThread>>,
}

type JoinedThread = (
    JoinHandle<()>,
    mpsc::Receiver<std::result::Result<(), OperationFailure>>,
);

/// The controller loop runs as one build operation on its own thread.
struct RunBuildOperation {
    name: BuildId,
    controller: Arc<IncludedBuildController>,
}

impl RunnableOperation for RunBuildOperation {
    fn description(&self) -> OperationDescriptorBuilder {
        OperationDescriptor::builder(format!("Run tasks for build: {}", self.name))
            .operation_type(OperationType::Tasks)
    }

    fn run(&mut self) -> std::result::Result<(), BuildFailure> {
        self.controller.run()
    }
}

/// Creates, starts and stops the controllers of every included build that
/// takes part in the current execution.
///
/// Lock order is start latch, then map shard. Controller creation holds a
/// shard entry while inserting, so it must release it before reading the
/// latch.
pub struct IncludedBuildControllers {
    registry: Arc<dyn IncludedBuildRegistry>,
    executor: Arc<OperationExecutor>,
    controllers: DashMap<BuildId, Arc<ControllerHandle>>,
    execution_started: Mutex<bool>,
}

impl IncludedBuildControllers {
    pub fn new(registry: Arc<dyn IncludedBuildRegistry>, executor: Arc<OperationExecutor>) -> Self {
        Self {
            registry,
            executor,
            controllers: DashMap::new(),
            execution_started: Mutex::new(false),
        }
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// The controller for `build`, creating it and spawning its thread the
    /// first time the build is referenced. A controller created after task
    /// execution has begun is started immediately.
    pub fn get_build_controller(&self, build: &BuildId) -> Result<Arc<IncludedBuildController>> {
        if let Some(handle) = self.controllers.get(build) {
            return Ok(handle.controller.clone());
        }
        let included = self
            .registry
            .find_build(build)
            .ok_or_else(|| CompositeError::UnknownBuild(build.clone()))?;

        let handle = match self.controllers.entry(build.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let controller = Arc::new(IncludedBuildController::new(included));
                let (sender, receiver) = mpsc::channel();
                let thread = {
                    let controller = controller.clone();
                    let executor = self.executor.clone();
                    let name = build.clone();
                    thread::Builder::new()
                        .name(format!("keel-build-{build}"))
                        .spawn(move || {
                            let mut operation = RunBuildOperation { name, controller };
                            let _ = sender.send(executor.run(&mut operation));
                        })
                        .map_err(|source| CompositeError::ThreadSpawn {
                            build: build.clone(),
                            source,
                        })?
                };
                let handle = Arc::new(ControllerHandle {
                    controller,
                    join: Mutex::new(Some((thread, receiver))),
                });
                vacant.insert(handle.clone());
                handle
            }
        };

        // Entry guard released; safe to look at the latch now.
        if *self.execution_started.lock() {
            handle.controller.start_task_execution();
        }
        Ok(handle.controller.clone())
    }

    /// Run population passes until no controller schedules new work. Each
    /// pass snapshots the registered controllers, so builds discovered
    /// mid-pass get their own pass.
    pub fn populate_task_graphs(&self) {
        loop {
            let handles: Vec<Arc<ControllerHandle>> = self
                .controllers
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            let mut scheduled = false;
            for handle in &handles {
                scheduled |= handle.controller.populate_task_graph(self);
            }
            if !scheduled {
                break;
            }
        }
    }

    /// Release every controller thread into task execution.
    pub fn start_task_execution(&self) {
        let mut started = self.execution_started.lock();
        *started = true;
        for entry in self.controllers.iter() {
            entry.value().controller.start_task_execution();
        }
    }

    /// Stop every controller and join its thread, collecting every failure
    /// before reporting any.
    pub fn stop(&self) -> Result<()> {
        let mut failures: Vec<OperationFailure> = Vec::new();
        let handles: Vec<(BuildId, Arc<ControllerHandle>)> = self
            .controllers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (build, handle) in handles {
            handle.controller.stop();
            let joined = handle.join.lock().take();
            let Some((thread, results)) = joined else {
                continue;
            };
            if thread.join().is_err() {
                let failure: OperationFailure = Arc::new(std::io::Error::other(format!(
                    "controller thread for build '{build}' panicked"
                )));
                failures.push(failure);
                continue;
            }
            if let Ok(Err(failure)) = results.recv() {
                failures.push(failure);
            }
        }
        self.controllers.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            tracing::warn!(count = failures.len(), "included builds failed");
            Err(CompositeError::Stop { failures })
        }
    }
}

impl BuildDiscovery for IncludedBuildControllers {
    fn ensure_build(&self, build: &BuildId) {
        if let Err(error) = self.get_build_controller(build) {
            tracing::warn!(build = %build, %error, "referenced build is not part of the composite");
        }
    }
}
