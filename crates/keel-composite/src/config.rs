//! Engine configuration, layered from defaults, a config file and the
//! environment.

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logging::LogLevel;

pub const CONFIG_FILE: &str = "keel.config.json";
pub const ENV_PREFIX: &str = "KEEL_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on concurrently leased workers.
    pub max_workers: usize,
    /// Whether resolution schedules the tasks that produce local project
    /// artifacts.
    pub build_project_dependencies: bool,
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            build_project_dependencies: true,
            log_level: LogLevel::Info,
        }
    }
}

impl EngineConfig {
    /// Defaults, overridden by `keel.config.json` in the working directory,
    /// overridden by `KEEL_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(config_file: &Path) -> Result<Self> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            serde_json::json!({
                "max_workers": 12,
                "log_level": "debug"
            })
            .to_string(),
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.max_workers, 12);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.build_project_dependencies);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"max_workers": "many"}"#).unwrap();
        assert!(EngineConfig::load_from(&path).is_err());
    }
}
