//! End-to-end tests over controllers and the launcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_composite::{
    BuildDiscovery, BuildExecuter, BuildFailure, BuildLauncher, BuildRegistry, CompositeError,
    IncludedBuild, IncludedBuildControllers, Settings, SettingsLoader,
};
use keel_ops::{
    OperationDescriptor, OperationEventBus, OperationExecutor, OperationFinished, OperationListener,
    OperationStarted, OperationType,
};
use keel_resolve::BuildId;
use parking_lot::Mutex;

struct TestBuild {
    name: BuildId,
    dependencies: Vec<BuildId>,
    populated: AtomicBool,
    executed: Arc<AtomicBool>,
    failure: Option<String>,
}

impl TestBuild {
    fn new(name: &str, dependencies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: BuildId::new(name),
            dependencies: dependencies.iter().map(|name| BuildId::new(*name)).collect(),
            populated: AtomicBool::new(false),
            executed: Arc::new(AtomicBool::new(false)),
            failure: None,
        })
    }

    fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: BuildId::new(name),
            dependencies: Vec::new(),
            populated: AtomicBool::new(false),
            executed: Arc::new(AtomicBool::new(false)),
            failure: Some(message.to_string()),
        })
    }

    fn executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }
}

impl IncludedBuild for TestBuild {
    fn name(&self) -> &BuildId {
        &self.name
    }

    fn populate_task_graph(&self, discovery: &dyn BuildDiscovery) -> bool {
        if self.populated.swap(true, Ordering::SeqCst) {
            return false;
        }
        for dependency in &self.dependencies {
            discovery.ensure_build(dependency);
        }
        true
    }

    fn execute_tasks(&self) -> Result<(), BuildFailure> {
        self.executed.store(true, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(Box::new(std::io::Error::other(message.clone()))),
            None => Ok(()),
        }
    }
}

fn controllers_for(builds: &[Arc<TestBuild>]) -> Arc<IncludedBuildControllers> {
    let registry = Arc::new(BuildRegistry::new());
    for build in builds {
        registry.register(build.clone());
    }
    let executor = Arc::new(OperationExecutor::new(OperationEventBus::new()));
    Arc::new(IncludedBuildControllers::new(registry, executor))
}

#[test]
fn population_reaches_a_fixed_point_across_transitive_builds() {
    // a depends on b, b depends on c; only a is requested directly, so c
    // can only appear through a second population pass.
    let a = TestBuild::new("a", &["b"]);
    let b = TestBuild::new("b", &["c"]);
    let c = TestBuild::new("c", &[]);
    let controllers = controllers_for(&[a.clone(), b.clone(), c.clone()]);

    controllers.get_build_controller(&BuildId::new("a")).unwrap();
    controllers.populate_task_graphs();
    assert_eq!(controllers.controller_count(), 3);

    controllers.start_task_execution();
    controllers.stop().unwrap();
    assert!(a.executed());
    assert!(b.executed());
    assert!(c.executed());
}

#[test]
fn controller_created_after_start_begins_executing_immediately() {
    let late = TestBuild::new("late", &[]);
    let controllers = controllers_for(&[late.clone()]);

    controllers.start_task_execution();
    controllers.get_build_controller(&BuildId::new("late")).unwrap();
    controllers.stop().unwrap();
    assert!(late.executed());
}

#[test]
fn unstarted_controllers_stop_without_executing() {
    let idle = TestBuild::new("idle", &[]);
    let controllers = controllers_for(&[idle.clone()]);

    controllers.get_build_controller(&BuildId::new("idle")).unwrap();
    controllers.stop().unwrap();
    assert!(!idle.executed());
}

#[test]
fn stop_collects_every_build_failure() {
    let bad_a = TestBuild::failing("bad-a", "a exploded");
    let bad_b = TestBuild::failing("bad-b", "b exploded");
    let good = TestBuild::new("good", &[]);
    let controllers = controllers_for(&[bad_a, bad_b, good.clone()]);

    for name in ["bad-a", "bad-b", "good"] {
        controllers.get_build_controller(&BuildId::new(name)).unwrap();
    }
    controllers.start_task_execution();
    match controllers.stop() {
        Err(CompositeError::Stop { failures }) => {
            assert_eq!(failures.len(), 2);
            let messages: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
            assert!(messages.contains(&"a exploded".to_string()));
            assert!(messages.contains(&"b exploded".to_string()));
        }
        other => panic!("expected an aggregate failure, got {other:?}"),
    }
    assert!(good.executed());
}

#[test]
fn unknown_builds_are_rejected() {
    let controllers = controllers_for(&[]);
    let error = controllers
        .get_build_controller(&BuildId::new("ghost"))
        .unwrap_err();
    assert!(matches!(error, CompositeError::UnknownBuild(_)));
}

struct IncludingLoader {
    builds: Vec<Arc<TestBuild>>,
}

impl SettingsLoader for IncludingLoader {
    fn load(&self) -> Result<Settings, BuildFailure> {
        Ok(Settings {
            included_builds: self
                .builds
                .iter()
                .map(|build| build.clone() as Arc<dyn IncludedBuild>)
                .collect(),
        })
    }
}

/// Root build whose task graph pulls in one included build.
struct RootExecuter {
    controllers: Mutex<Option<Arc<IncludedBuildControllers>>>,
    requested: BuildId,
    executed: AtomicBool,
}

impl BuildExecuter for RootExecuter {
    fn calculate_task_graph(&self) -> Result<(), BuildFailure> {
        if let Some(controllers) = &*self.controllers.lock() {
            controllers.ensure_build(&self.requested);
        }
        Ok(())
    }

    fn execute_tasks(&self) -> Result<(), BuildFailure> {
        self.executed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordedOperations {
    names: Mutex<Vec<String>>,
}

impl OperationListener for RecordedOperations {
    fn started(&self, descriptor: &OperationDescriptor, _event: &OperationStarted) {
        self.names.lock().push(descriptor.display_name().to_string());
    }

    fn finished(&self, _descriptor: &OperationDescriptor, _event: &OperationFinished) {}
}

#[test]
fn launcher_runs_root_and_included_builds() {
    let lib = TestBuild::new("lib", &[]);
    let executer = Arc::new(RootExecuter {
        controllers: Mutex::new(None),
        requested: BuildId::new("lib"),
        executed: AtomicBool::new(false),
    });
    let mut launcher = BuildLauncher::builder()
        .settings_loader(Arc::new(IncludingLoader {
            builds: vec![lib.clone()],
        }))
        .executer(executer.clone())
        .build();
    *executer.controllers.lock() = Some(launcher.controllers().clone());

    let listener = Arc::new(RecordedOperations::default());
    launcher
        .executor()
        .bus()
        .subscribe_filtered(&[OperationType::Tasks], listener.clone());

    let result = launcher.run();
    assert!(result.is_success());
    launcher.stop().unwrap();

    assert!(executer.executed.load(Ordering::SeqCst));
    assert!(lib.executed());

    let names = listener.names.lock().clone();
    assert!(names.contains(&"Run tasks".to_string()));
    assert!(names.contains(&"Run tasks for build: lib".to_string()));
    // Configuration-stage operations are filtered out of this pipe.
    assert!(!names.iter().any(|name| name.starts_with("Configure")));
}

#[test]
fn included_build_failure_surfaces_from_stop() {
    let broken = TestBuild::failing("broken", "no compiler");
    let executer = Arc::new(RootExecuter {
        controllers: Mutex::new(None),
        requested: BuildId::new("broken"),
        executed: AtomicBool::new(false),
    });
    let mut launcher = BuildLauncher::builder()
        .settings_loader(Arc::new(IncludingLoader {
            builds: vec![broken],
        }))
        .executer(executer.clone())
        .build();
    *executer.controllers.lock() = Some(launcher.controllers().clone());

    assert!(launcher.run().is_success());
    match launcher.stop() {
        Err(CompositeError::Stop { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].to_string(), "no compiler");
        }
        other => panic!("expected an aggregate failure, got {other:?}"),
    }
}
