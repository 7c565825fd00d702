use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Terminated,
    Killed,
    /// A status value this crate does not write, such as NULL in a legacy row.
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Terminated => "terminated",
            RunStatus::Killed => "killed",
            RunStatus::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(RunStatus::Running),
            "finished" => Some(RunStatus::Finished),
            "terminated" => Some(RunStatus::Terminated),
            "killed" => Some(RunStatus::Killed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the durable run registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub pid: u32,
    pub command: String,
    pub cwd: Option<String>,
    pub status: RunStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub returncode: Option<i32>,
    pub stdout_path: String,
    pub stderr_path: String,
    pub extra_env: Option<BTreeMap<String, String>>,
    pub argv: Option<Vec<String>>,
}

/// Insert payload for [`crate::registry::RunRegistry::add_run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRun {
    pub pid: u32,
    pub command: String,
    pub cwd: Option<String>,
    pub stdout_path: String,
    pub stderr_path: String,
    pub extra_env: Option<BTreeMap<String, String>>,
    pub argv: Option<Vec<String>>,
    pub started_at: Option<String>,
}
