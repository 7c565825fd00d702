use super::signals::SignalDelivery;
use super::SupervisorError;
use crate::registry::{RunRegistry, RunStatus};
use serde::Serialize;

/// Outcome of matching `running` registry rows against live processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows marked `finished` because their process is gone.
    pub finished: Vec<u32>,
    /// Processes still alive that no supervisor in this process tracks.
    pub orphans: Vec<u32>,
    pub tracked: Vec<u32>,
}

pub fn reconcile_runs(
    registry: &RunRegistry,
    signals: &dyn SignalDelivery,
    tracked: &[u32],
) -> Result<ReconcileReport, SupervisorError> {
    let mut report = ReconcileReport::default();
    for run in registry.list_runs(true)? {
        if tracked.contains(&run.pid) {
            report.tracked.push(run.pid);
        } else if signals.is_alive(run.pid) {
            report.orphans.push(run.pid);
        } else {
            registry.update_status(run.pid, RunStatus::Finished, None, None)?;
            report.finished.push(run.pid);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NewRun;
    use crate::runtime::SignalError;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct FixedLiveness {
        alive: BTreeSet<u32>,
    }

    impl SignalDelivery for FixedLiveness {
        fn graceful(&self, _pid: u32) -> Result<(), SignalError> {
            Ok(())
        }

        fn forced(&self, _pid: u32) -> Result<(), SignalError> {
            Ok(())
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.contains(&pid)
        }
    }

    fn add(registry: &RunRegistry, pid: u32) {
        registry
            .add_run(&NewRun {
                pid,
                command: format!("job {pid}"),
                stdout_path: format!("/tmp/{pid}.out.log"),
                stderr_path: format!("/tmp/{pid}.err.log"),
                ..NewRun::default()
            })
            .expect("add run");
    }

    #[test]
    fn dead_rows_are_finished_and_live_ones_reported() {
        let dir = tempdir().expect("tempdir");
        let registry = RunRegistry::open(&dir.path().join("runs.db")).expect("registry");
        for pid in [100, 200, 300, 400] {
            add(&registry, pid);
        }
        registry
            .update_status(400, RunStatus::Killed, None, None)
            .expect("kill row");

        let signals = FixedLiveness {
            alive: BTreeSet::from([200]),
        };
        let mut report = reconcile_runs(&registry, &signals, &[300]).expect("reconcile");
        report.finished.sort_unstable();

        assert_eq!(report.finished, vec![100]);
        assert_eq!(report.orphans, vec![200]);
        assert_eq!(report.tracked, vec![300]);

        let finished = registry.get_run(100).expect("get").expect("row");
        assert_eq!(finished.status, RunStatus::Finished);
        assert_eq!(finished.returncode, None);
        assert!(finished.ended_at.is_some());
        let killed = registry.get_run(400).expect("get").expect("row");
        assert_eq!(killed.status, RunStatus::Killed);
    }
}
