pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings, load_settings_or_default};
pub use paths::{
    default_settings_path, default_state_root, GLOBAL_STATE_DIR, SETTINGS_FILE_NAME,
    STATE_ROOT_ENV,
};
pub use settings::{
    AutoAttachConfig, BackupConfig, LauncherBackend, LauncherConfig, Settings, TailConfig,
    TerminateConfig,
};
