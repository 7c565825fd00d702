use super::process_table::{LogPaths, ProcessStatus, ProcessTable, TrackedProcess};
use super::reconcile::{reconcile_runs, ReconcileReport};
use super::signals::{SignalDelivery, SignalError};
use super::watcher::{format_returncode, spawn_watcher};
use super::{append_runtime_log, StatePaths, SupervisorError};
use crate::command::{quote_command, split_command};
use crate::config::Settings;
use crate::registry::{NewRun, RunRegistry, RunStatus};
use crate::shared::{compact_stamp, now_iso_seconds};
use crate::tail::LogTailer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const CHILD_LOG_STDOUT_ENV: &str = "RUNBOARD_CHILD_LOG_STDOUT";
pub const CHILD_LOG_STDERR_ENV: &str = "RUNBOARD_CHILD_LOG_STDERR";
pub const CHILD_LOG_LEVEL_ENV: &str = "RUNBOARD_CHILD_LOG_LEVEL";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorOptions {
    pub child_log_level: String,
    pub auto_attach: bool,
    pub auto_attach_interval: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            child_log_level: "INFO".to_string(),
            auto_attach: false,
            auto_attach_interval: Duration::from_secs(2),
        }
    }
}

impl SupervisorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            child_log_level: settings.child_log_level.clone(),
            auto_attach: settings.auto_attach.enabled,
            auto_attach_interval: settings.auto_attach_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub log_prefix: Option<String>,
}

impl StartRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunHandle {
    pub pid: u32,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub started_at: String,
}

/// Result of stopping a process this supervisor did not spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachedStop {
    NotRunning,
    Stopped { forced: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopOutcome {
    AlreadyExited,
    Terminated,
    Killed,
}

/// Spawns child processes, tracks their lifecycle and mirrors every state
/// transition into the run registry.
#[derive(Debug)]
pub struct ProcessSupervisor {
    paths: StatePaths,
    registry: RunRegistry,
    signals: Arc<dyn SignalDelivery>,
    table: Arc<ProcessTable>,
    tailer: LogTailer,
    options: SupervisorOptions,
}

impl ProcessSupervisor {
    pub fn new(
        paths: StatePaths,
        registry: RunRegistry,
        signals: Arc<dyn SignalDelivery>,
        options: SupervisorOptions,
    ) -> Self {
        let table = Arc::new(ProcessTable::new());
        let tailer = LogTailer::new(Arc::clone(&table), paths.clone());
        Self {
            paths,
            registry,
            signals,
            table,
            tailer,
            options,
        }
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn tailer(&self) -> &LogTailer {
        &self.tailer
    }

    pub fn start(&self, request: StartRequest) -> Result<RunHandle, SupervisorError> {
        let program = request
            .argv
            .first()
            .cloned()
            .ok_or(SupervisorError::EmptyCommand)?;
        if let Some(cwd) = &request.cwd {
            if !cwd.is_dir() {
                return Err(SupervisorError::InvalidWorkingDirectory {
                    path: cwd.display().to_string(),
                });
            }
        }

        let logs_dir = self.paths.run_logs_dir();
        fs::create_dir_all(&logs_dir).map_err(|source| SupervisorError::CreateDir {
            path: logs_dir.display().to_string(),
            source,
        })?;
        let prefix = request
            .log_prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string)
            .unwrap_or_else(compact_stamp);
        let (prefix, stdout_file, stderr_file) = create_log_files(&logs_dir, &prefix)?;
        let initial = LogPaths {
            stdout: log_path(&logs_dir, &prefix, None, "out"),
            stderr: log_path(&logs_dir, &prefix, None, "err"),
        };

        let mut command = Command::new(&program);
        command
            .args(&request.argv[1..])
            .envs(&request.env)
            .env(CHILD_LOG_STDOUT_ENV, &initial.stdout)
            .env(CHILD_LOG_STDERR_ENV, &initial.stderr)
            .env(CHILD_LOG_LEVEL_ENV, self.child_log_level(&request.env))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let _ = fs::remove_file(&initial.stdout);
                let _ = fs::remove_file(&initial.stderr);
                append_runtime_log(
                    &self.paths,
                    "error",
                    "process.spawn_failed",
                    &format!("program={program} error={source}"),
                );
                return Err(SupervisorError::Spawn { program, source });
            }
        };
        let pid = child.id();
        let started_at = now_iso_seconds();
        let logs = LogPaths {
            stdout: self.rename_with_pid(&initial.stdout, log_path(&logs_dir, &prefix, Some(pid), "out")),
            stderr: self.rename_with_pid(&initial.stderr, log_path(&logs_dir, &prefix, Some(pid), "err")),
        };

        let process = TrackedProcess::new(pid);
        self.table.insert(process.clone(), logs.clone());

        let command_line = quote_command(&request.argv);
        let cwd = request
            .cwd
            .as_ref()
            .map(|cwd| cwd.display().to_string());
        append_runtime_log(
            &self.paths,
            "info",
            "process.started",
            &format!(
                "pid={pid} command={command_line} cwd={} stdout={} stderr={}",
                cwd.as_deref().unwrap_or("."),
                logs.stdout.display(),
                logs.stderr.display()
            ),
        );

        let record = NewRun {
            pid,
            command: command_line.clone(),
            cwd,
            stdout_path: logs.stdout.display().to_string(),
            stderr_path: logs.stderr.display().to_string(),
            extra_env: (!request.env.is_empty()).then(|| request.env.clone()),
            argv: Some(request.argv.clone()),
            started_at: Some(started_at.clone()),
        };
        if let Err(err) = self.registry.add_run(&record) {
            self.log_registry_failure(pid, "running", &err.to_string());
        }

        spawn_watcher(child, process, self.registry.clone(), self.paths.clone());

        if self.options.auto_attach {
            self.tailer.enable_auto_attach(
                pid,
                Some(command_line.as_str()),
                self.options.auto_attach_interval,
            );
        }

        Ok(RunHandle {
            pid,
            stdout_path: logs.stdout,
            stderr_path: logs.stderr,
            started_at,
        })
    }

    pub fn status(&self, pid: u32) -> ProcessStatus {
        self.table.status(pid)
    }

    /// Stops a process spawned by this supervisor. Returns false only for a
    /// pid this supervisor never started.
    pub fn terminate(&self, pid: u32, force_after: Duration) -> bool {
        let Some(process) = self.table.process(pid) else {
            return false;
        };
        self.stop_tracked(&process, force_after);
        true
    }

    fn stop_tracked(&self, process: &TrackedProcess, force_after: Duration) -> StopOutcome {
        let pid = process.pid();
        let outcome = self.stop_tracked_inner(process, force_after);
        self.tailer.disable_auto_attach(pid);
        outcome
    }

    fn stop_tracked_inner(&self, process: &TrackedProcess, force_after: Duration) -> StopOutcome {
        let pid = process.pid();
        if let Some(exit) = process.request_terminate() {
            self.record_terminal(pid, RunStatus::Finished, exit.returncode);
            return StopOutcome::AlreadyExited;
        }

        if let Err(err) = self.signals.graceful(pid) {
            self.log_signal_failure(pid, "graceful", &err);
        }
        let deadline = Instant::now() + force_after.max(POLL_INTERVAL);
        loop {
            if let Some(exit) = process.exit() {
                self.record_terminal(pid, RunStatus::Terminated, exit.returncode);
                return StopOutcome::Terminated;
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        append_runtime_log(
            &self.paths,
            "warn",
            "process.terminate.force_kill",
            &format!("pid={pid} force_after_ms={}", force_after.as_millis()),
        );
        if let Err(err) = self.signals.forced(pid) {
            self.log_signal_failure(pid, "forced", &err);
        }
        let reap_deadline = Instant::now() + REAP_TIMEOUT;
        let returncode = loop {
            if let Some(exit) = process.exit() {
                break exit.returncode;
            }
            if Instant::now() >= reap_deadline {
                break None;
            }
            thread::sleep(POLL_INTERVAL / 2);
        };
        self.record_terminal(pid, RunStatus::Killed, returncode);
        StopOutcome::Killed
    }

    /// Stops a process recorded as running in the registry, whether or not
    /// this supervisor spawned it. Untracked processes are probed by pid.
    pub fn terminate_detached(
        &self,
        pid: u32,
        force_after: Duration,
    ) -> Result<DetachedStop, SupervisorError> {
        if let Some(process) = self.table.process(pid) {
            return Ok(match self.stop_tracked(&process, force_after) {
                StopOutcome::AlreadyExited => DetachedStop::NotRunning,
                StopOutcome::Terminated => DetachedStop::Stopped { forced: false },
                StopOutcome::Killed => DetachedStop::Stopped { forced: true },
            });
        }

        let run = self
            .registry
            .get_run(pid)?
            .ok_or(SupervisorError::UnknownRun { pid })?;
        if run.status != RunStatus::Running {
            return Ok(DetachedStop::NotRunning);
        }
        if !self.signals.is_alive(pid) {
            self.record_terminal(pid, RunStatus::Finished, None);
            return Ok(DetachedStop::NotRunning);
        }

        if let Err(err) = self.signals.graceful(pid) {
            self.log_signal_failure(pid, "graceful", &err);
        }
        if self.wait_until_dead(pid, force_after.max(POLL_INTERVAL)) {
            self.record_terminal(pid, RunStatus::Terminated, None);
            return Ok(DetachedStop::Stopped { forced: false });
        }

        append_runtime_log(
            &self.paths,
            "warn",
            "process.terminate.force_kill",
            &format!("pid={pid} detached=true"),
        );
        if let Err(err) = self.signals.forced(pid) {
            self.log_signal_failure(pid, "forced", &err);
        }
        self.wait_until_dead(pid, REAP_TIMEOUT);
        self.record_terminal(pid, RunStatus::Killed, None);
        Ok(DetachedStop::Stopped { forced: true })
    }

    fn wait_until_dead(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.signals.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stops the recorded run (when still running) and starts its command
    /// again with the same working directory and environment.
    pub fn restart(&self, pid: u32, force_after: Duration) -> Result<RunHandle, SupervisorError> {
        let run = self
            .registry
            .get_run(pid)?
            .ok_or(SupervisorError::UnknownRun { pid })?;
        let argv = match run.argv.clone().filter(|argv| !argv.is_empty()) {
            Some(argv) => argv,
            None => split_command(&run.command)
                .map_err(|reason| SupervisorError::UnreplayableCommand { pid, reason })?,
        };

        if self.table.status(pid).running {
            self.terminate(pid, force_after);
        } else if self.table.process(pid).is_none() && run.status == RunStatus::Running {
            self.terminate_detached(pid, force_after)?;
        }

        append_runtime_log(
            &self.paths,
            "info",
            "process.restart",
            &format!("pid={pid} command={}", run.command),
        );
        self.start(StartRequest {
            argv,
            cwd: run.cwd.map(PathBuf::from),
            env: run.extra_env.unwrap_or_default(),
            log_prefix: Some(format!("restart_{pid}")),
        })
    }

    pub fn reconcile(&self) -> Result<ReconcileReport, SupervisorError> {
        let report = reconcile_runs(&self.registry, self.signals.as_ref(), &self.table.pids())?;
        append_runtime_log(
            &self.paths,
            "info",
            "registry.reconciled",
            &format!(
                "finished={} orphans={} tracked={}",
                report.finished.len(),
                report.orphans.len(),
                report.tracked.len()
            ),
        );
        Ok(report)
    }

    /// Polls until the process exits or `timeout` elapses. `None` for a pid
    /// this supervisor never started.
    pub fn wait(&self, pid: u32, timeout: Option<Duration>) -> Option<ProcessStatus> {
        self.table.process(pid)?;
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let status = self.table.status(pid);
            if !status.running {
                return Some(status);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Some(status);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn child_log_level(&self, env: &BTreeMap<String, String>) -> String {
        env.get("LOG_LEVEL")
            .map(|level| level.trim())
            .filter(|level| !level.is_empty())
            .or_else(|| {
                Some(self.options.child_log_level.trim()).filter(|level| !level.is_empty())
            })
            .unwrap_or("INFO")
            .to_ascii_uppercase()
    }

    fn rename_with_pid(&self, from: &Path, to: PathBuf) -> PathBuf {
        match fs::rename(from, &to) {
            Ok(()) => to,
            Err(err) => {
                append_runtime_log(
                    &self.paths,
                    "warn",
                    "process.log_rename_failed",
                    &format!("from={} to={} error={err}", from.display(), to.display()),
                );
                from.to_path_buf()
            }
        }
    }

    fn record_terminal(&self, pid: u32, status: RunStatus, returncode: Option<i32>) {
        append_runtime_log(
            &self.paths,
            "info",
            &format!("process.{status}"),
            &format!("pid={pid} returncode={}", format_returncode(returncode)),
        );
        if let Err(err) = self.registry.update_status(pid, status, returncode, None) {
            self.log_registry_failure(pid, status.as_str(), &err.to_string());
        }
    }

    fn log_registry_failure(&self, pid: u32, status: &str, error: &str) {
        append_runtime_log(
            &self.paths,
            "warn",
            "registry.write_failed",
            &format!("pid={pid} status={status} error={error}"),
        );
    }

    fn log_signal_failure(&self, pid: u32, kind: &str, err: &SignalError) {
        append_runtime_log(
            &self.paths,
            "warn",
            "process.signal_failed",
            &format!("pid={pid} signal={kind} error={err}"),
        );
    }
}

fn log_path(dir: &Path, prefix: &str, pid: Option<u32>, stream: &str) -> PathBuf {
    match pid {
        Some(pid) => dir.join(format!("{prefix}_pid_{pid}.{stream}.log")),
        None => dir.join(format!("{prefix}.{stream}.log")),
    }
}

/// Creates both pre-spawn log files. A prefix already in use gets a numeric
/// suffix so concurrent starts never share files.
fn create_log_files(dir: &Path, prefix: &str) -> Result<(String, File, File), SupervisorError> {
    let mut candidate = prefix.to_string();
    let mut attempt = 1;
    loop {
        let stdout_path = log_path(dir, &candidate, None, "out");
        match OpenOptions::new().write(true).create_new(true).open(&stdout_path) {
            Ok(stdout_file) => {
                let stderr_path = log_path(dir, &candidate, None, "err");
                return match File::create(&stderr_path) {
                    Ok(stderr_file) => Ok((candidate, stdout_file, stderr_file)),
                    Err(source) => {
                        let _ = fs::remove_file(&stdout_path);
                        Err(SupervisorError::CreateLog {
                            path: stderr_path.display().to_string(),
                            source,
                        })
                    }
                };
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                candidate = format!("{prefix}-{attempt}");
                attempt += 1;
            }
            Err(source) => {
                return Err(SupervisorError::CreateLog {
                    path: stdout_path.display().to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_paths_carry_prefix_and_pid() {
        let dir = Path::new("/state/logs/runs");
        assert_eq!(
            log_path(dir, "20240501-100000", None, "out"),
            PathBuf::from("/state/logs/runs/20240501-100000.out.log")
        );
        assert_eq!(
            log_path(dir, "restart_7", Some(42), "err"),
            PathBuf::from("/state/logs/runs/restart_7_pid_42.err.log")
        );
    }

    #[test]
    fn colliding_prefixes_get_a_suffix() {
        let dir = tempdir().expect("tempdir");
        let (first, _, _) = create_log_files(dir.path(), "job").expect("first");
        let (second, _, _) = create_log_files(dir.path(), "job").expect("second");
        assert_eq!(first, "job");
        assert_eq!(second, "job-1");
        assert!(dir.path().join("job-1.err.log").exists());
    }

    #[test]
    fn child_log_level_prefers_env_then_options() {
        let dir = tempdir().expect("tempdir");
        let registry = RunRegistry::open(&dir.path().join("runs.db")).expect("registry");
        let supervisor = ProcessSupervisor::new(
            StatePaths::new(dir.path()),
            registry,
            Arc::new(crate::runtime::ProcessGroupSignals),
            SupervisorOptions {
                child_log_level: "warning".to_string(),
                ..SupervisorOptions::default()
            },
        );

        let mut env = BTreeMap::new();
        assert_eq!(supervisor.child_log_level(&env), "WARNING");
        env.insert("LOG_LEVEL".to_string(), "debug".to_string());
        assert_eq!(supervisor.child_log_level(&env), "DEBUG");
    }
}
