use crate::app::command_support::{
    build_supervisor, ensure_runtime_root, load_settings, open_registry, parse_count, parse_pid,
};
use crate::registry::Run;
use crate::tail::merge_log_tails;
use std::path::Path;

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn render_run_line(run: &Run) -> String {
    format!(
        "pid={} status={} started_at={} ended_at={} returncode={} command={}",
        run.pid,
        run.status,
        run.started_at,
        run.ended_at.as_deref().unwrap_or("-"),
        run.returncode
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
        run.command
    )
}

pub fn cmd_runs(args: &[String]) -> Result<String, String> {
    let active_only = match args {
        [] => false,
        [flag] if flag == "--active" => true,
        _ => return Err("usage: runs [--active]".to_string()),
    };
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let registry = open_registry(&paths, &settings)?;
    let runs = registry
        .list_runs(active_only)
        .map_err(|e| e.to_string())?;
    if runs.is_empty() {
        return Ok("no runs".to_string());
    }
    Ok(runs
        .iter()
        .map(render_run_line)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn load_run(args: &[String], usage: &str) -> Result<Run, String> {
    let raw = args.first().ok_or_else(|| usage.to_string())?;
    let pid = parse_pid(raw)?;
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let registry = open_registry(&paths, &settings)?;
    registry
        .get_run(pid)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no recorded run for pid {pid}"))
}

pub fn cmd_show(args: &[String]) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: show <pid>".to_string());
    }
    let run = load_run(args, "usage: show <pid>")?;
    serde_json::to_string_pretty(&run).map_err(|e| format!("failed to encode run: {e}"))
}

/// Tails the log files recorded for the run, so it also works for runs
/// started by another invocation.
pub fn cmd_tail(args: &[String]) -> Result<String, String> {
    let usage = "usage: tail <pid> [--lines N]";
    let max_lines = match args {
        [_] => None,
        [_, flag, value] if flag == "--lines" => Some(parse_count(value, "--lines")?),
        _ => return Err(usage.to_string()),
    };
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let run = load_run(args, usage)?;
    let tail = merge_log_tails(
        Path::new(&run.stdout_path),
        Path::new(&run.stderr_path),
        max_lines.unwrap_or(settings.tail.max_lines),
    );
    if tail.is_empty() {
        return Ok(format!("pid={}\n(no output)", run.pid));
    }
    Ok(tail.to_text())
}

pub fn cmd_reconcile(args: &[String]) -> Result<String, String> {
    if !args.is_empty() {
        return Err("usage: reconcile".to_string());
    }
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let supervisor = build_supervisor(&paths, &settings)?;
    let report = supervisor.reconcile().map_err(|e| e.to_string())?;
    Ok(format!(
        "reconciled\nfinished={}\norphans={}",
        join_pids(&report.finished),
        join_pids(&report.orphans)
    ))
}
