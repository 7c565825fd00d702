use super::ConfigError;
use crate::command::Launcher;
use crate::runtime::StatePaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHILD_LOG_LEVEL: &str = "INFO";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_runs_db")]
    pub runs_db: PathBuf,
    #[serde(default = "default_child_log_level")]
    pub child_log_level: String,
    #[serde(default)]
    pub auto_attach: AutoAttachConfig,
    #[serde(default)]
    pub terminate: TerminateConfig,
    #[serde(default)]
    pub tail: TailConfig,
    #[serde(default)]
    pub backups: BackupConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub environments: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runs_db: default_runs_db(),
            child_log_level: default_child_log_level(),
            auto_attach: AutoAttachConfig::default(),
            terminate: TerminateConfig::default(),
            tail: TailConfig::default(),
            backups: BackupConfig::default(),
            launcher: LauncherConfig::default(),
            environments: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoAttachConfig {
    pub enabled: bool,
    pub interval_seconds: f64,
}

impl Default for AutoAttachConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerminateConfig {
    pub force_after_seconds: f64,
}

impl Default for TerminateConfig {
    fn default() -> Self {
        Self {
            force_after_seconds: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TailConfig {
    pub max_lines: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self { max_lines: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    pub dir: Option<PathBuf>,
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { dir: None, keep: 7 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherBackend {
    Conda,
    Python,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub backend: LauncherBackend,
    pub conda_env: String,
    pub runners_package: String,
    pub python: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            backend: LauncherBackend::Conda,
            conda_env: "qf".to_string(),
            runners_package: "runners".to_string(),
            python: None,
        }
    }
}

fn default_runs_db() -> PathBuf {
    PathBuf::from("runs.db")
}

fn default_child_log_level() -> String {
    DEFAULT_CHILD_LOG_LEVEL.to_string()
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.auto_attach.interval_seconds > 0.0) {
            return Err(ConfigError::Settings(
                "`auto_attach.interval_seconds` must be greater than zero".to_string(),
            ));
        }
        if !(self.terminate.force_after_seconds >= 0.0) {
            return Err(ConfigError::Settings(
                "`terminate.force_after_seconds` must not be negative".to_string(),
            ));
        }
        if self.tail.max_lines == 0 {
            return Err(ConfigError::Settings(
                "`tail.max_lines` must be at least 1".to_string(),
            ));
        }
        if self.backups.keep == 0 {
            return Err(ConfigError::Settings(
                "`backups.keep` must be at least 1".to_string(),
            ));
        }
        if self.child_log_level.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`child_log_level` must be non-empty".to_string(),
            ));
        }
        if self.launcher.runners_package.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`launcher.runners_package` must be non-empty".to_string(),
            ));
        }
        for name in self.environments.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Settings(
                    "environment names must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn resolve_runs_db(&self, paths: &StatePaths) -> PathBuf {
        if self.runs_db.is_absolute() {
            self.runs_db.clone()
        } else {
            paths.root.join(&self.runs_db)
        }
    }

    pub fn resolve_backups_dir(&self, paths: &StatePaths) -> PathBuf {
        match &self.backups.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => paths.root.join(dir),
            None => paths.backups_dir(),
        }
    }

    pub fn auto_attach_interval(&self) -> Duration {
        Duration::from_secs_f64(self.auto_attach.interval_seconds.max(0.0))
    }

    pub fn force_after(&self) -> Duration {
        Duration::from_secs_f64(self.terminate.force_after_seconds.max(0.0))
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Resolves a named environment with keys upper-cased.
    pub fn environment(&self, name: &str) -> Result<BTreeMap<String, String>, ConfigError> {
        let section =
            self.environments
                .get(name)
                .ok_or_else(|| ConfigError::MissingEnvironment {
                    name: name.to_string(),
                })?;
        Ok(section
            .iter()
            .map(|(key, value)| (key.to_ascii_uppercase(), value.clone()))
            .collect())
    }

    /// The python backend needs an interpreter path; without one the conda
    /// launcher is used instead.
    pub fn launcher(&self) -> Launcher {
        let package = self.launcher.runners_package.trim().to_string();
        match (self.launcher.backend, &self.launcher.python) {
            (LauncherBackend::Python, Some(interpreter)) => Launcher::Python {
                interpreter: interpreter.clone(),
                package,
            },
            _ => Launcher::Conda {
                env: self.launcher.conda_env.trim().to_string(),
                package,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings: Settings = serde_yaml::from_str("{}").expect("parse settings");
        assert_eq!(settings, Settings::default());
        settings.validate().expect("defaults validate");
        assert_eq!(settings.force_after(), Duration::from_secs(5));
        assert_eq!(settings.auto_attach_interval(), Duration::from_secs(2));
    }

    #[test]
    fn runs_db_and_backups_resolve_against_state_root() {
        let settings: Settings = serde_yaml::from_str(
            r#"
runs_db: data/runs.db
backups:
  dir: snapshots
  keep: 3
"#,
        )
        .expect("parse settings");
        let paths = StatePaths::new("/tmp/rb");
        assert_eq!(
            settings.resolve_runs_db(&paths),
            PathBuf::from("/tmp/rb/data/runs.db")
        );
        assert_eq!(
            settings.resolve_backups_dir(&paths),
            PathBuf::from("/tmp/rb/snapshots")
        );

        let defaults = Settings::default();
        assert_eq!(
            defaults.resolve_backups_dir(&paths),
            PathBuf::from("/tmp/rb/backups")
        );
    }

    #[test]
    fn environment_lookup_upper_cases_keys() {
        let settings: Settings = serde_yaml::from_str(
            r#"
environments:
  DEV:
    api_url: http://localhost:8000
    LOG_LEVEL: debug
"#,
        )
        .expect("parse settings");
        let env = settings.environment("DEV").expect("dev env");
        assert_eq!(
            env.get("API_URL").map(String::as_str),
            Some("http://localhost:8000")
        );
        assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("debug"));

        let err = settings.environment("PROD").expect_err("missing env");
        assert!(matches!(err, ConfigError::MissingEnvironment { .. }));
    }

    #[test]
    fn python_backend_without_interpreter_falls_back_to_conda() {
        let settings: Settings = serde_yaml::from_str(
            r#"
launcher:
  backend: python
  conda_env: analytics
"#,
        )
        .expect("parse settings");
        assert_eq!(
            settings.launcher(),
            Launcher::Conda {
                env: "analytics".to_string(),
                package: "runners".to_string(),
            }
        );
    }

    #[test]
    fn validation_rejects_zero_interval_and_keep() {
        let settings: Settings = serde_yaml::from_str(
            r#"
auto_attach:
  interval_seconds: 0
"#,
        )
        .expect("parse settings");
        let err = settings.validate().expect_err("zero interval");
        assert!(err.to_string().contains("interval_seconds"));

        let settings: Settings = serde_yaml::from_str(
            r#"
backups:
  keep: 0
"#,
        )
        .expect("parse settings");
        let err = settings.validate().expect_err("zero keep");
        assert!(err.to_string().contains("backups.keep"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_yaml::from_str::<Settings>("runs_dbx: x.db\n").expect_err("unknown");
        assert!(err.to_string().contains("unknown field"));
    }
}
