use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    pub returncode: Option<i32>,
}

#[derive(Debug, Default)]
struct ExitState {
    exit: Option<ExitRecord>,
    terminate_requested: bool,
}

/// Shared handle to one spawned child's exit state. The watcher thread owns
/// the `Child` itself and publishes the result here.
#[derive(Debug, Clone)]
pub struct TrackedProcess {
    pid: u32,
    state: Arc<Mutex<ExitState>>,
}

impl TrackedProcess {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            state: Arc::new(Mutex::new(ExitState::default())),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn exit(&self) -> Option<ExitRecord> {
        lock(&self.state).exit
    }

    pub fn has_exited(&self) -> bool {
        self.exit().is_some()
    }

    /// Publishes the exit. When no terminate is in flight, `finish` runs
    /// before the exit becomes visible to other threads and `true` is
    /// returned.
    pub fn record_exit(&self, returncode: Option<i32>, finish: impl FnOnce()) -> bool {
        let mut state = lock(&self.state);
        let owns_write = !state.terminate_requested;
        if owns_write {
            finish();
        }
        state.exit = Some(ExitRecord { returncode });
        owns_write
    }

    /// Marks the process as being terminated and returns the exit if it was
    /// already observed. From here on the terminating side owns the terminal
    /// registry write.
    pub fn request_terminate(&self) -> Option<ExitRecord> {
        let mut state = lock(&self.state);
        state.terminate_requested = true;
        state.exit
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub known: bool,
    pub running: bool,
    pub returncode: Option<i32>,
}

impl ProcessStatus {
    pub fn unknown() -> Self {
        Self {
            known: false,
            running: false,
            returncode: None,
        }
    }
}

/// In-memory view of the processes one supervisor has spawned.
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: Mutex<BTreeMap<u32, TrackedProcess>>,
    log_paths: Mutex<BTreeMap<u32, LogPaths>>,
    tailers: Mutex<BTreeMap<u32, Arc<AtomicBool>>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, process: TrackedProcess, paths: LogPaths) {
        let pid = process.pid();
        lock(&self.log_paths).insert(pid, paths);
        lock(&self.processes).insert(pid, process);
    }

    pub fn process(&self, pid: u32) -> Option<TrackedProcess> {
        lock(&self.processes).get(&pid).cloned()
    }

    pub fn log_paths(&self, pid: u32) -> Option<LogPaths> {
        lock(&self.log_paths).get(&pid).cloned()
    }

    pub fn pids(&self) -> Vec<u32> {
        lock(&self.processes).keys().copied().collect()
    }

    pub fn status(&self, pid: u32) -> ProcessStatus {
        match self.process(pid) {
            None => ProcessStatus::unknown(),
            Some(process) => match process.exit() {
                Some(exit) => ProcessStatus {
                    known: true,
                    running: false,
                    returncode: exit.returncode,
                },
                None => ProcessStatus {
                    known: true,
                    running: true,
                    returncode: None,
                },
            },
        }
    }

    /// Registers a tail loop for `pid`. Returns `None` when one is already
    /// registered.
    pub fn claim_tailer(&self, pid: u32) -> Option<Arc<AtomicBool>> {
        let mut tailers = lock(&self.tailers);
        if tailers.contains_key(&pid) {
            return None;
        }
        let stop = Arc::new(AtomicBool::new(false));
        tailers.insert(pid, Arc::clone(&stop));
        Some(stop)
    }

    /// Removes the control entry only if it still belongs to the loop holding
    /// `stop`; a later loop for the same pid keeps its entry.
    pub fn release_tailer(&self, pid: u32, stop: &Arc<AtomicBool>) {
        let mut tailers = lock(&self.tailers);
        if tailers
            .get(&pid)
            .map(|current| Arc::ptr_eq(current, stop))
            .unwrap_or(false)
        {
            tailers.remove(&pid);
        }
    }

    pub fn stop_tailer(&self, pid: u32) -> bool {
        match lock(&self.tailers).remove(&pid) {
            Some(stop) => {
                stop.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn tailer_active(&self, pid: u32) -> bool {
        lock(&self.tailers).contains_key(&pid)
    }
}
