//! Composite build orchestration for the keel build engine.
//!
//! A composite is a root build plus the builds it includes. Each included
//! build gets a controller running on its own thread ([`controllers`]); the
//! [`launcher`] drives the root build through its stages, populating the
//! composite's task graphs to a fixed point before anything executes.

pub mod config;
pub mod controller;
pub mod controllers;
pub mod error;
pub mod launcher;
pub mod lease;
pub mod logging;

pub use config::EngineConfig;
pub use controller::{BuildDiscovery, IncludedBuild, IncludedBuildController};
pub use controllers::{BuildRegistry, IncludedBuildControllers, IncludedBuildRegistry};
pub use error::{BuildFailure, CompositeError, Result};
pub use launcher::{
    BuildCompletionListener, BuildConfigurer, BuildExecuter, BuildLauncher, BuildLauncherBuilder,
    BuildListener, BuildResult, ExceptionAnalyser, Settings, SettingsLoader,
};
pub use lease::{WorkerLease, WorkerLeaseService};
pub use logging::LogLevel;
