use super::{default_settings_path, ConfigError, Settings};
use std::path::Path;

pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = default_settings_path()?;
    load_settings_or_default(&path)
}

/// Missing settings files are not an error: every field has a default.
pub fn load_settings_or_default(path: &Path) -> Result<Settings, ConfigError> {
    let settings = if path.exists() {
        Settings::from_path(path)?
    } else {
        Settings::default()
    };
    settings.validate()?;
    Ok(settings)
}
