use super::SupervisorError;
use crate::config::{default_state_root, SETTINGS_FILE_NAME};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.logs_dir(), self.run_logs_dir(), self.backups_dir()]
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn run_logs_dir(&self) -> PathBuf {
        self.logs_dir().join("runs")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn runtime_log_path(&self) -> PathBuf {
        self.logs_dir().join("runboard.log")
    }
}

pub fn default_state_root_path() -> Result<PathBuf, SupervisorError> {
    default_state_root().map_err(|_| SupervisorError::HomeDirectoryUnavailable)
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), SupervisorError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| SupervisorError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
