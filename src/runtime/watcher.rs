use super::{append_runtime_log, StatePaths, TrackedProcess};
use crate::registry::{RunRegistry, RunStatus};
use std::process::{Child, ExitStatus};
use std::thread;

/// Exit code, or `-signal` for a child ended by a signal.
pub(crate) fn returncode_of(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(-signal);
        }
    }
    None
}

/// Blocks on the child in a background thread and records `finished` unless a
/// terminate request already owns the terminal write. The registry row is
/// written before the exit is published, so a caller that observes the exit
/// also observes the row.
pub(super) fn spawn_watcher(
    mut child: Child,
    process: TrackedProcess,
    registry: RunRegistry,
    paths: StatePaths,
) {
    thread::spawn(move || {
        let pid = process.pid();
        let returncode = match child.wait() {
            Ok(status) => returncode_of(status),
            Err(err) => {
                append_runtime_log(
                    &paths,
                    "error",
                    "process.wait_failed",
                    &format!("pid={pid} error={err}"),
                );
                None
            }
        };

        process.record_exit(returncode, || {
            if let Err(err) = registry.update_status(pid, RunStatus::Finished, returncode, None) {
                append_runtime_log(
                    &paths,
                    "warn",
                    "registry.write_failed",
                    &format!("pid={pid} status=finished error={err}"),
                );
            }
        });
        append_runtime_log(
            &paths,
            "info",
            "process.exited",
            &format!("pid={pid} returncode={}", format_returncode(returncode)),
        );
    });
}

pub(crate) fn format_returncode(returncode: Option<i32>) -> String {
    returncode
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}
