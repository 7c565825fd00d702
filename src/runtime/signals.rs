//! Graceful and forced stop signals delivered to a whole process group.

use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("no process or process group with id {pid}")]
    NoSuchProcess { pid: u32 },
    #[error("failed to signal process {pid}: {source}")]
    Os {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("process signalling is not supported on this platform")]
    Unsupported,
}

/// Platform seam for stopping a spawned process and its descendants.
///
/// Children are spawned as process-group leaders, so `pid` doubles as the
/// group id.
pub trait SignalDelivery: Send + Sync + Debug {
    fn graceful(&self, pid: u32) -> Result<(), SignalError>;
    fn forced(&self, pid: u32) -> Result<(), SignalError>;
    fn is_alive(&self, pid: u32) -> bool;
}

/// SIGTERM / SIGKILL to the process group, falling back to the single process
/// when the group cannot be signalled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGroupSignals;

impl SignalDelivery for ProcessGroupSignals {
    fn graceful(&self, pid: u32) -> Result<(), SignalError> {
        platform::signal_group(pid, platform::Stop::Graceful)
    }

    fn forced(&self, pid: u32) -> Result<(), SignalError> {
        platform::signal_group(pid, platform::Stop::Forced)
    }

    fn is_alive(&self, pid: u32) -> bool {
        platform::is_alive(pid)
    }
}

#[cfg(unix)]
mod platform {
    use super::SignalError;

    #[derive(Debug, Clone, Copy)]
    pub(super) enum Stop {
        Graceful,
        Forced,
    }

    fn raw_pid(pid: u32) -> Result<libc::pid_t, SignalError> {
        match libc::pid_t::try_from(pid) {
            Ok(raw) if raw > 0 => Ok(raw),
            _ => Err(SignalError::NoSuchProcess { pid }),
        }
    }

    pub(super) fn signal_group(pid: u32, stop: Stop) -> Result<(), SignalError> {
        let raw = raw_pid(pid)?;
        let signal = match stop {
            Stop::Graceful => libc::SIGTERM,
            Stop::Forced => libc::SIGKILL,
        };

        // SAFETY: killpg/kill only read their integer arguments.
        if unsafe { libc::killpg(raw, signal) } == 0 {
            return Ok(());
        }
        if unsafe { libc::kill(raw, signal) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Err(SignalError::NoSuchProcess { pid });
        }
        Err(SignalError::Os { pid, source: err })
    }

    pub(super) fn is_alive(pid: u32) -> bool {
        let Ok(raw) = raw_pid(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs the permission and existence check only.
        let exists = unsafe { libc::kill(raw, 0) } == 0
            || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
        exists && !is_zombie(raw)
    }

    /// Signal 0 succeeds for exited processes nobody has reaped yet.
    #[cfg(target_os = "linux")]
    fn is_zombie(raw: libc::pid_t) -> bool {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{raw}/stat")) else {
            return false;
        };
        // The command name may contain spaces or parens; the state follows
        // the last closing paren.
        stat.rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .map(|state| state == 'Z' || state == 'X')
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "linux"))]
    fn is_zombie(_raw: libc::pid_t) -> bool {
        false
    }
}

#[cfg(not(unix))]
mod platform {
    use super::SignalError;

    #[derive(Debug, Clone, Copy)]
    pub(super) enum Stop {
        Graceful,
        Forced,
    }

    pub(super) fn signal_group(_pid: u32, _stop: Stop) -> Result<(), SignalError> {
        Err(SignalError::Unsupported)
    }

    pub(super) fn is_alive(_pid: u32) -> bool {
        false
    }
}
