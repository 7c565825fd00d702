use runboard::registry::{NewRun, RunRegistry, RunStatus};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn new_run(pid: u32) -> NewRun {
    NewRun {
        pid,
        command: format!("sleep {pid}"),
        stdout_path: format!("/tmp/{pid}.out.log"),
        stderr_path: format!("/tmp/{pid}.err.log"),
        ..NewRun::default()
    }
}

#[test]
fn extra_env_and_argv_round_trip() {
    let tmp = tempdir().expect("tempdir");
    let registry = RunRegistry::open(&tmp.path().join("runs.db")).expect("open registry");

    let mut run = new_run(1234);
    run.cwd = Some("/srv/jobs".to_string());
    run.extra_env = Some(BTreeMap::from([
        ("K".to_string(), "V".to_string()),
        ("LOG_LEVEL".to_string(), "debug".to_string()),
    ]));
    run.argv = Some(vec!["sleep".to_string(), "1234".to_string()]);
    registry.add_run(&run).expect("add run");

    let stored = registry.get_run(1234).expect("get run").expect("row");
    assert_eq!(stored.status, RunStatus::Running);
    assert_eq!(stored.cwd.as_deref(), Some("/srv/jobs"));
    assert_eq!(stored.extra_env, run.extra_env);
    assert_eq!(stored.argv, run.argv);
    assert!(!stored.started_at.is_empty());
    assert_eq!(stored.ended_at, None);
    assert_eq!(stored.returncode, None);

    registry.add_run(&new_run(99)).expect("add bare run");
    let bare = registry.get_run(99).expect("get run").expect("row");
    assert_eq!(bare.extra_env, None);
    assert_eq!(bare.cwd, None);
}

#[test]
fn update_for_unknown_pid_touches_nothing() {
    let tmp = tempdir().expect("tempdir");
    let registry = RunRegistry::open(&tmp.path().join("runs.db")).expect("open registry");

    let touched = registry
        .update_status(4242, RunStatus::Finished, Some(0), None)
        .expect("update");
    assert_eq!(touched, 0);
    assert!(registry.get_run(4242).expect("get run").is_none());
    assert!(registry.list_runs(false).expect("list").is_empty());
}

#[test]
fn active_listing_only_returns_running_rows() {
    let tmp = tempdir().expect("tempdir");
    let registry = RunRegistry::open(&tmp.path().join("runs.db")).expect("open registry");
    for pid in [1, 2, 3] {
        registry.add_run(&new_run(pid)).expect("add run");
    }
    registry
        .update_status(2, RunStatus::Terminated, Some(-15), Some("2024-05-01T10:00:00"))
        .expect("terminate");

    let active: Vec<u32> = registry
        .list_runs(true)
        .expect("list active")
        .into_iter()
        .map(|run| run.pid)
        .collect();
    assert_eq!(active, vec![3, 1]);

    let all = registry.list_runs(false).expect("list all");
    assert_eq!(all.len(), 3);
    let terminated = all.iter().find(|run| run.pid == 2).expect("pid 2");
    assert_eq!(terminated.status, RunStatus::Terminated);
    assert_eq!(terminated.returncode, Some(-15));
    assert_eq!(terminated.ended_at.as_deref(), Some("2024-05-01T10:00:00"));
}

#[test]
fn legacy_table_gains_optional_columns_and_start_times() {
    let tmp = tempdir().expect("tempdir");
    let db = tmp.path().join("runs.db");
    {
        let connection = Connection::open(&db).expect("open sqlite");
        connection
            .execute_batch(
                "
                CREATE TABLE runs (
                    pid INTEGER PRIMARY KEY,
                    command TEXT,
                    cwd TEXT,
                    status TEXT,
                    started_at TEXT,
                    ended_at TEXT,
                    returncode INTEGER,
                    stdout_path TEXT,
                    stderr_path TEXT
                );
                INSERT INTO runs (pid, command, cwd, status, started_at, stdout_path, stderr_path)
                VALUES (77, 'python -m runners.ingest', '', 'finished', NULL, '/tmp/a', '/tmp/b');
                ",
            )
            .expect("legacy schema");
    }

    let registry = RunRegistry::open(&db).expect("open registry");
    let run = registry.get_run(77).expect("get run").expect("row");
    assert_eq!(run.status, RunStatus::Finished);
    assert!(!run.started_at.is_empty());
    assert_eq!(run.cwd, None);
    assert_eq!(run.extra_env, None);
    assert_eq!(run.argv, None);

    let columns = registry.column_names().expect("columns");
    assert!(columns.iter().any(|name| name == "env_json"));
    assert!(columns.iter().any(|name| name == "argv_json"));
}

#[test]
fn rows_with_foreign_or_missing_status_do_not_break_listing() {
    let tmp = tempdir().expect("tempdir");
    let db = tmp.path().join("runs.db");
    let registry = RunRegistry::open(&db).expect("open registry");
    registry.add_run(&new_run(5)).expect("add run");
    {
        let connection = Connection::open(&db).expect("open sqlite");
        connection
            .execute_batch(
                "
                INSERT INTO runs (pid, command, status, started_at, stdout_path, stderr_path)
                VALUES (6, 'legacy job', NULL, '2020-01-01T00:00:00', '/tmp/6.out', '/tmp/6.err');
                INSERT INTO runs (pid, command, status, started_at, stdout_path, stderr_path)
                VALUES (7, 'other tool', 'paused', '2020-01-01T00:00:01', '/tmp/7.out', '/tmp/7.err');
                ",
            )
            .expect("insert foreign rows");
    }

    let all = registry.list_runs(false).expect("list all");
    let pids: Vec<u32> = all.iter().map(|run| run.pid).collect();
    assert_eq!(pids, vec![5, 7, 6]);
    assert_eq!(all[1].status, RunStatus::Unknown);
    assert_eq!(all[2].status, RunStatus::Unknown);

    let active: Vec<u32> = registry
        .list_runs(true)
        .expect("list active")
        .iter()
        .map(|run| run.pid)
        .collect();
    assert_eq!(active, vec![5]);

    let legacy = registry.get_run(6).expect("get run").expect("row");
    assert_eq!(legacy.command, "legacy job");
    assert!(legacy.status.is_terminal());
}
