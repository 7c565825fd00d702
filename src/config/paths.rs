use crate::config::ConfigError;
use std::path::PathBuf;

pub const GLOBAL_STATE_DIR: &str = ".runboard";
pub const SETTINGS_FILE_NAME: &str = "config.yaml";
pub const STATE_ROOT_ENV: &str = "RUNBOARD_HOME";

/// `$RUNBOARD_HOME` when set and non-empty, otherwise `$HOME/.runboard`.
pub fn default_state_root() -> Result<PathBuf, ConfigError> {
    if let Some(root) = std::env::var_os(STATE_ROOT_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    Ok(default_state_root()?.join(SETTINGS_FILE_NAME))
}
