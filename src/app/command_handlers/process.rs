use crate::app::command_support::{
    build_supervisor, ensure_runtime_root, load_settings, parse_launch_args, parse_pid,
    parse_seconds, resolve_start_request,
};
use crate::runtime::{DetachedStop, RunHandle};
use std::time::Duration;

fn render_handle(handle: &RunHandle) -> String {
    format!(
        "pid={}\nstdout={}\nstderr={}\nstarted_at={}",
        handle.pid,
        handle.stdout_path.display(),
        handle.stderr_path.display(),
        handle.started_at
    )
}

/// `<pid> [--force-after SECS]`
fn parse_stop_args(args: &[String], verb: &str, default: Duration) -> Result<(u32, Duration), String> {
    let usage = format!("usage: {verb} <pid> [--force-after SECS]");
    let pid = parse_pid(args.first().ok_or_else(|| usage.clone())?)?;
    match &args[1..] {
        [] => Ok((pid, default)),
        [flag, value] if flag == "--force-after" => Ok((pid, parse_seconds(value)?)),
        _ => Err(usage),
    }
}

pub fn cmd_start(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let launch = parse_launch_args(args)?;
    let request = resolve_start_request(&launch, &settings)?;
    let supervisor = build_supervisor(&paths, &settings)?;
    let handle = supervisor.start(request).map_err(|e| e.to_string())?;
    Ok(format!("started\n{}", render_handle(&handle)))
}

/// Starts the command and stays in the foreground until it exits, forwarding
/// its output into the operational log.
pub fn cmd_run(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let launch = parse_launch_args(args)?;
    let request = resolve_start_request(&launch, &settings)?;
    let supervisor = build_supervisor(&paths, &settings)?;
    let handle = supervisor.start(request).map_err(|e| e.to_string())?;
    supervisor.tailer().enable_auto_attach(
        handle.pid,
        None,
        settings.auto_attach_interval(),
    );

    let status = supervisor
        .wait(handle.pid, None)
        .ok_or_else(|| format!("lost track of pid {}", handle.pid))?;
    let output = supervisor
        .tailer()
        .tail(handle.pid, settings.tail.max_lines)
        .map(|tail| tail.to_text())
        .unwrap_or_default();
    let returncode = status
        .returncode
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string());
    Ok(format!(
        "finished\n{}\nreturncode={returncode}\n{output}",
        render_handle(&handle)
    ))
}

pub fn cmd_stop(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let (pid, force_after) = parse_stop_args(args, "stop", settings.force_after())?;
    let supervisor = build_supervisor(&paths, &settings)?;
    match supervisor
        .terminate_detached(pid, force_after)
        .map_err(|e| e.to_string())?
    {
        DetachedStop::NotRunning => Ok(format!("stopped\npid={pid}\nrunning=false")),
        DetachedStop::Stopped { forced } => Ok(format!("stopped\npid={pid}\nforced={forced}")),
    }
}

pub fn cmd_restart(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let (pid, force_after) = parse_stop_args(args, "restart", settings.force_after())?;
    let supervisor = build_supervisor(&paths, &settings)?;
    let handle = supervisor
        .restart(pid, force_after)
        .map_err(|e| e.to_string())?;
    Ok(format!(
        "restarted\nprevious_pid={pid}\n{}",
        render_handle(&handle)
    ))
}
