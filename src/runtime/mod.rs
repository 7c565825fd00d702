pub mod logging;
pub mod process_table;
pub mod reconcile;
pub mod signals;
pub mod state_paths;
pub mod supervisor;
mod watcher;

pub use logging::{append_runtime_log, read_runtime_log, RuntimeLogEntry};
pub use process_table::{ExitRecord, LogPaths, ProcessStatus, ProcessTable, TrackedProcess};
pub use reconcile::ReconcileReport;
pub use signals::{ProcessGroupSignals, SignalDelivery, SignalError};
pub use state_paths::{bootstrap_state_root, default_state_root_path, StatePaths};
pub use supervisor::{
    DetachedStop, ProcessSupervisor, RunHandle, StartRequest, SupervisorOptions,
    CHILD_LOG_LEVEL_ENV, CHILD_LOG_STDERR_ENV, CHILD_LOG_STDOUT_ENV,
};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to create runtime path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve home directory for runtime state root")]
    HomeDirectoryUnavailable,
    #[error("command must contain at least one argument")]
    EmptyCommand,
    #[error("working directory {path} is not an existing directory")]
    InvalidWorkingDirectory { path: String },
    #[error("failed to create log file {path}: {source}")]
    CreateLog {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no recorded run for pid {pid}")]
    UnknownRun { pid: u32 },
    #[error("recorded command for pid {pid} cannot be replayed: {reason}")]
    UnreplayableCommand { pid: u32, reason: String },
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
}
