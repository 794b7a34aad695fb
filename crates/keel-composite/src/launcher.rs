//! The launcher that takes one build through its lifecycle stages.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use keel_ops::{
    OperationDescriptor, OperationDescriptorBuilder, OperationEventBus, OperationExecutor,
    OperationFailure, OperationType, RunnableOperation,
};

use crate::config::EngineConfig;
use crate::controller::IncludedBuild;
use crate::controllers::{BuildRegistry, IncludedBuildControllers};
use crate::error::{BuildFailure, CompositeError};
use crate::lease::WorkerLeaseService;

/// What loading the settings produced.
#[derive(Default)]
pub struct Settings {
    pub included_builds: Vec<Arc<dyn IncludedBuild>>,
}

pub trait SettingsLoader: Send + Sync {
    fn load(&self) -> Result<Settings, BuildFailure>;
}

pub trait BuildConfigurer: Send + Sync {
    fn configure(&self, settings: &Settings) -> Result<(), BuildFailure>;
}

/// Calculates and runs the task graph of the launcher's own build. The
/// included builds are handled by their controllers.
pub trait BuildExecuter: Send + Sync {
    fn calculate_task_graph(&self) -> Result<(), BuildFailure>;
    fn execute_tasks(&self) -> Result<(), BuildFailure>;
}

/// Rewrites a build failure before it is reported, e.g. to unwrap layers
/// that mean nothing to the user.
pub trait ExceptionAnalyser: Send + Sync {
    fn transform(&self, failure: BuildFailure) -> BuildFailure {
        failure
    }
}

pub trait BuildListener: Send + Sync {
    fn build_started(&self) {}
    fn build_finished(&self, result: &BuildResult) {
        let _ = result;
    }
}

/// Notified exactly once, when the launcher is stopped.
pub trait BuildCompletionListener: Send + Sync {
    fn completed(&self);
}

/// Outcome of one launcher run.
#[derive(Clone)]
pub struct BuildResult {
    failure: Option<OperationFailure>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        self.failure.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Load,
    Configure,
    Build,
}

struct NoopAnalyser;
impl ExceptionAnalyser for NoopAnalyser {}

struct NoopBuildListener;
impl BuildListener for NoopBuildListener {}

struct NoopCompletionListener;
impl BuildCompletionListener for NoopCompletionListener {
    fn completed(&self) {}
}

struct EmptySettingsLoader;
impl SettingsLoader for EmptySettingsLoader {
    fn load(&self) -> Result<Settings, BuildFailure> {
        Ok(Settings::default())
    }
}

struct NoopConfigurer;
impl BuildConfigurer for NoopConfigurer {
    fn configure(&self, _settings: &Settings) -> Result<(), BuildFailure> {
        Ok(())
    }
}

struct NoopExecuter;
impl BuildExecuter for NoopExecuter {
    fn calculate_task_graph(&self) -> Result<(), BuildFailure> {
        Ok(())
    }

    fn execute_tasks(&self) -> Result<(), BuildFailure> {
        Ok(())
    }
}

/// An operation failure re-boxed so a stage can propagate it.
#[derive(Debug)]
struct SharedFailure(OperationFailure);

impl fmt::Display for SharedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for SharedFailure {}

/// One launcher stage run as a build operation.
struct StageOperation<'a> {
    display_name: String,
    operation_type: OperationType,
    launcher: &'a mut BuildLauncher,
    body: fn(&mut BuildLauncher) -> Result<(), BuildFailure>,
}

impl RunnableOperation for StageOperation<'_> {
    fn description(&self) -> OperationDescriptorBuilder {
        OperationDescriptor::builder(self.display_name.clone())
            .operation_type(self.operation_type)
    }

    fn run(&mut self) -> Result<(), BuildFailure> {
        (self.body)(self.launcher)
    }
}

/// Drives one build through load, configure and execute, coordinating the
/// included-build controllers along the way.
///
/// A launcher runs once; asking it to do more work after its build has run
/// is a programming error and panics.
pub struct BuildLauncher {
    name: Option<String>,
    executor: Arc<OperationExecutor>,
    leases: Arc<WorkerLeaseService>,
    registry: Arc<BuildRegistry>,
    controllers: Arc<IncludedBuildControllers>,
    settings_loader: Arc<dyn SettingsLoader>,
    configurer: Arc<dyn BuildConfigurer>,
    executer: Arc<dyn BuildExecuter>,
    analyser: Arc<dyn ExceptionAnalyser>,
    build_listener: Arc<dyn BuildListener>,
    completion_listener: Arc<dyn BuildCompletionListener>,
    stage: Option<Stage>,
    settings: Option<Settings>,
}

impl BuildLauncher {
    pub fn builder() -> BuildLauncherBuilder {
        BuildLauncherBuilder::default()
    }

    pub fn executor(&self) -> &Arc<OperationExecutor> {
        &self.executor
    }

    pub fn controllers(&self) -> &Arc<IncludedBuildControllers> {
        &self.controllers
    }

    /// The loaded settings; present once the load stage has run.
    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// Run the whole build. Holds one worker lease for the entire sequence
    /// and always fires `build_finished`, success or not.
    pub fn run(&mut self) -> BuildResult {
        let leases = self.leases.clone();
        leases.with_worker_lease(|| self.do_build(Stage::Build))
    }

    /// Load the settings only, without configuring or running anything.
    pub fn load_settings(&mut self) -> Result<(), BuildFailure> {
        self.do_stages(Stage::Load)
    }

    /// Load and configure, stopping short of task execution.
    pub fn configure(&mut self) -> Result<(), BuildFailure> {
        self.do_stages(Stage::Configure)
    }

    /// Stop the included-build controllers. The completion listener is
    /// notified even when stopping fails.
    pub fn stop(&mut self) -> Result<(), CompositeError> {
        let result = self.controllers.stop();
        self.completion_listener.completed();
        result
    }

    fn do_build(&mut self, upto: Stage) -> BuildResult {
        self.build_listener.build_started();
        let failure = self.do_stages(upto).err().map(|failure| {
            let transformed = self.analyser.transform(failure);
            OperationFailure::from(transformed)
        });
        let result = BuildResult { failure };
        self.build_listener.build_finished(&result);
        result
    }

    fn do_stages(&mut self, upto: Stage) -> Result<(), BuildFailure> {
        if self.stage == Some(Stage::Build) {
            panic!("this launcher has already run its build and cannot be reused");
        }
        if self.stage.is_none() {
            self.load()?;
            self.stage = Some(Stage::Load);
        }
        if upto == Stage::Load {
            return Ok(());
        }
        if self.stage == Some(Stage::Load) {
            self.run_stage(
                "Configure build",
                OperationType::Configuration,
                |launcher| match &launcher.settings {
                    Some(settings) => launcher.configurer.configure(settings),
                    None => launcher.configurer.configure(&Settings::default()),
                },
            )?;
            self.stage = Some(Stage::Configure);
        }
        if upto == Stage::Configure {
            return Ok(());
        }
        // Terminal from here on, even when a later stage fails.
        self.stage = Some(Stage::Build);
        self.run_stage(
            "Calculate task graph",
            OperationType::Configuration,
            |launcher| {
                launcher.executer.calculate_task_graph()?;
                launcher.controllers.populate_task_graphs();
                Ok(())
            },
        )?;
        self.run_stage("Run tasks", OperationType::Tasks, |launcher| {
            launcher.controllers.start_task_execution();
            launcher.executer.execute_tasks()
        })?;
        Ok(())
    }

    fn load(&mut self) -> Result<(), BuildFailure> {
        let settings = self.settings_loader.load()?;
        for build in &settings.included_builds {
            tracing::debug!(build = %build.name(), "registering included build");
            self.registry.register(build.clone());
        }
        self.settings = Some(settings);
        Ok(())
    }

    /// Nested builds carry their name in every stage operation, so listeners
    /// can tell the builds of a composite apart.
    fn stage_name(&self, base: &str) -> String {
        match &self.name {
            Some(name) => format!("{base} ({name})"),
            None => base.to_string(),
        }
    }

    fn run_stage(
        &mut self,
        base_name: &str,
        operation_type: OperationType,
        body: fn(&mut BuildLauncher) -> Result<(), BuildFailure>,
    ) -> Result<(), BuildFailure> {
        let display_name = self.stage_name(base_name);
        let executor = self.executor.clone();
        let mut operation = StageOperation {
            display_name,
            operation_type,
            launcher: self,
            body,
        };
        executor
            .run(&mut operation)
            .map_err(|failure| Box::new(SharedFailure(failure)) as BuildFailure)
    }
}

#[derive(Default)]
pub struct BuildLauncherBuilder {
    name: Option<String>,
    max_workers: Option<usize>,
    executor: Option<Arc<OperationExecutor>>,
    leases: Option<Arc<WorkerLeaseService>>,
    registry: Option<Arc<BuildRegistry>>,
    settings_loader: Option<Arc<dyn SettingsLoader>>,
    configurer: Option<Arc<dyn BuildConfigurer>>,
    executer: Option<Arc<dyn BuildExecuter>>,
    analyser: Option<Arc<dyn ExceptionAnalyser>>,
    build_listener: Option<Arc<dyn BuildListener>>,
    completion_listener: Option<Arc<dyn BuildCompletionListener>>,
}

impl BuildLauncherBuilder {
    /// Name of a nested build; the root build has none.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.max_workers = Some(config.max_workers);
        self
    }

    pub fn executor(mut self, executor: Arc<OperationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn leases(mut self, leases: Arc<WorkerLeaseService>) -> Self {
        self.leases = Some(leases);
        self
    }

    pub fn registry(mut self, registry: Arc<BuildRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn settings_loader(mut self, loader: Arc<dyn SettingsLoader>) -> Self {
        self.settings_loader = Some(loader);
        self
    }

    pub fn configurer(mut self, configurer: Arc<dyn BuildConfigurer>) -> Self {
        self.configurer = Some(configurer);
        self
    }

    pub fn executer(mut self, executer: Arc<dyn BuildExecuter>) -> Self {
        self.executer = Some(executer);
        self
    }

    pub fn exception_analyser(mut self, analyser: Arc<dyn ExceptionAnalyser>) -> Self {
        self.analyser = Some(analyser);
        self
    }

    pub fn build_listener(mut self, listener: Arc<dyn BuildListener>) -> Self {
        self.build_listener = Some(listener);
        self
    }

    pub fn completion_listener(mut self, listener: Arc<dyn BuildCompletionListener>) -> Self {
        self.completion_listener = Some(listener);
        self
    }

    pub fn build(self) -> BuildLauncher {
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(OperationExecutor::new(OperationEventBus::new())));
        let leases = self.leases.unwrap_or_else(|| {
            Arc::new(WorkerLeaseService::new(
                self.max_workers
                    .unwrap_or_else(|| EngineConfig::default().max_workers),
            ))
        });
        let registry = self.registry.unwrap_or_default();
        let controllers = Arc::new(IncludedBuildControllers::new(
            registry.clone(),
            executor.clone(),
        ));
        BuildLauncher {
            name: self.name,
            executor,
            leases,
            registry,
            controllers,
            settings_loader: self.settings_loader.unwrap_or(Arc::new(EmptySettingsLoader)),
            configurer: self.configurer.unwrap_or(Arc::new(NoopConfigurer)),
            executer: self.executer.unwrap_or(Arc::new(NoopExecuter)),
            analyser: self.analyser.unwrap_or(Arc::new(NoopAnalyser)),
            build_listener: self.build_listener.unwrap_or(Arc::new(NoopBuildListener)),
            completion_listener: self
                .completion_listener
                .unwrap_or(Arc::new(NoopCompletionListener)),
            stage: None,
            settings: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: &str) {
            self.calls.lock().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    struct RecordingCollaborators {
        recorder: Arc<Recorder>,
        configure_failure: Option<String>,
        execute_failure: Option<String>,
    }

    impl SettingsLoader for RecordingCollaborators {
        fn load(&self) -> Result<Settings, BuildFailure> {
            self.recorder.record("load");
            Ok(Settings::default())
        }
    }

    impl BuildConfigurer for RecordingCollaborators {
        fn configure(&self, _settings: &Settings) -> Result<(), BuildFailure> {
            self.recorder.record("configure");
            match &self.configure_failure {
                Some(message) => Err(Box::new(std::io::Error::other(message.clone()))),
                None => Ok(()),
            }
        }
    }

    impl BuildExecuter for RecordingCollaborators {
        fn calculate_task_graph(&self) -> Result<(), BuildFailure> {
            self.recorder.record("calculate");
            Ok(())
        }

        fn execute_tasks(&self) -> Result<(), BuildFailure> {
            self.recorder.record("execute");
            match &self.execute_failure {
                Some(message) => Err(Box::new(std::io::Error::other(message.clone()))),
                None => Ok(()),
            }
        }
    }

    impl BuildListener for RecordingCollaborators {
        fn build_started(&self) {
            self.recorder.record("build_started");
        }

        fn build_finished(&self, result: &BuildResult) {
            self.recorder.record(if result.is_success() {
                "build_finished ok"
            } else {
                "build_finished failed"
            });
        }
    }

    impl BuildCompletionListener for RecordingCollaborators {
        fn completed(&self) {
            self.recorder.record("completed");
        }
    }

    fn launcher_with(recorder: Arc<Recorder>, configure_failure: Option<String>) -> BuildLauncher {
        let collaborators = Arc::new(RecordingCollaborators {
            recorder,
            configure_failure,
            execute_failure: None,
        });
        BuildLauncher::builder()
            .settings_loader(collaborators.clone())
            .configurer(collaborators.clone())
            .executer(collaborators.clone())
            .build_listener(collaborators.clone())
            .completion_listener(collaborators)
            .build()
    }

    #[test]
    fn run_goes_through_every_stage_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut launcher = launcher_with(recorder.clone(), None);
        let result = launcher.run();
        assert!(result.is_success());
        launcher.stop().unwrap();
        assert_eq!(
            recorder.calls(),
            vec![
                "build_started",
                "load",
                "configure",
                "calculate",
                "execute",
                "build_finished ok",
                "completed",
            ]
        );
    }

    #[test]
    fn earlier_stages_are_not_repeated() {
        let recorder = Arc::new(Recorder::default());
        let mut launcher = launcher_with(recorder.clone(), None);
        launcher.load_settings().unwrap();
        launcher.configure().unwrap();
        launcher.configure().unwrap();
        launcher.run();
        assert_eq!(
            recorder.calls(),
            vec![
                "load",
                "configure",
                "build_started",
                "calculate",
                "execute",
                "build_finished ok",
            ]
        );
    }

    #[test]
    #[should_panic(expected = "cannot be reused")]
    fn a_finished_launcher_cannot_run_again() {
        let mut launcher = launcher_with(Arc::new(Recorder::default()), None);
        launcher.run();
        launcher.run();
    }

    #[test]
    #[should_panic(expected = "cannot be reused")]
    fn a_launcher_whose_execution_failed_cannot_run_again() {
        let recorder = Arc::new(Recorder::default());
        let collaborators = Arc::new(RecordingCollaborators {
            recorder: recorder.clone(),
            configure_failure: None,
            execute_failure: Some("task broke".into()),
        });
        let mut launcher = BuildLauncher::builder()
            .settings_loader(collaborators.clone())
            .configurer(collaborators.clone())
            .executer(collaborators)
            .build();
        let result = launcher.run();
        assert!(!result.is_success());
        launcher.run();
    }

    #[test]
    fn a_default_launcher_runs_and_stops_cleanly() {
        let mut launcher = BuildLauncher::builder().build();
        assert!(launcher.run().is_success());
        launcher.stop().unwrap();
    }

    #[test]
    fn configure_failure_still_fires_build_finished() {
        let recorder = Arc::new(Recorder::default());
        let mut launcher = launcher_with(recorder.clone(), Some("bad script".into()));
        let result = launcher.run();
        assert!(!result.is_success());
        assert!(result.failure().unwrap().to_string().contains("bad script"));
        assert_eq!(
            recorder.calls(),
            vec!["build_started", "load", "configure", "build_finished failed"]
        );
    }

    #[test]
    fn analyser_rewrites_the_reported_failure() {
        struct Prefixing;
        impl ExceptionAnalyser for Prefixing {
            fn transform(&self, failure: BuildFailure) -> BuildFailure {
                Box::new(std::io::Error::other(format!("build failed: {failure}")))
            }
        }

        let recorder = Arc::new(Recorder::default());
        let collaborators = Arc::new(RecordingCollaborators {
            recorder,
            configure_failure: Some("bad script".into()),
            execute_failure: None,
        });
        let mut launcher = BuildLauncher::builder()
            .settings_loader(collaborators.clone())
            .configurer(collaborators.clone())
            .executer(collaborators)
            .exception_analyser(Arc::new(Prefixing))
            .build();
        let result = launcher.run();
        assert!(result
            .failure()
            .unwrap()
            .to_string()
            .starts_with("build failed:"));
    }

    #[test]
    fn nested_builds_contextualize_stage_names() {
        let launcher = BuildLauncher::builder().name("plugins").build();
        assert_eq!(launcher.stage_name("Run tasks"), "Run tasks (plugins)");
        let root = BuildLauncher::builder().build();
        assert_eq!(root.stage_name("Run tasks"), "Run tasks");
    }
}
