#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_runboard"))
        .args(args)
        .env("HOME", home)
        .env_remove("RUNBOARD_HOME")
        .output()
        .expect("run runboard")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

fn assert_err_contains(output: &Output, needle: &str) {
    assert!(
        !output.status.success(),
        "expected failure, stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
    let text = format!("{}{}", stdout(output), stderr(output));
    assert!(
        text.contains(needle),
        "expected error to contain `{needle}`, got:\n{text}"
    );
}

fn field(output: &str, key: &str) -> String {
    output
        .lines()
        .find_map(|line| line.strip_prefix(&format!("{key}=")))
        .map(str::to_string)
        .unwrap_or_else(|| panic!("missing `{key}` in:\n{output}"))
}

#[test]
fn help_and_unknown_commands() {
    let tmp = tempdir().expect("tempdir");
    let help = run(tmp.path(), &[]);
    assert_ok(&help);
    assert!(stdout(&help).contains("reconcile"));

    assert_err_contains(&run(tmp.path(), &["launch"]), "unknown command `launch`");
    assert_err_contains(&run(tmp.path(), &["show", "abc"]), "invalid pid `abc`");
    assert_err_contains(&run(tmp.path(), &["show", "4242"]), "no recorded run for pid 4242");
}

#[test]
fn run_waits_and_records_the_outcome() {
    let tmp = tempdir().expect("tempdir");
    let output = run(
        tmp.path(),
        &["run", "--", "sh", "-c", "echo hello-out; echo hello-err >&2; exit 4"],
    );
    assert_ok(&output);
    let text = stdout(&output);
    assert!(text.starts_with("finished"));
    assert_eq!(field(&text, "returncode"), "4");
    assert!(text.contains("hello-out"));
    let pid = field(&text, "pid");

    let runs = run(tmp.path(), &["runs"]);
    assert_ok(&runs);
    let listing = stdout(&runs);
    assert!(listing.contains(&format!("pid={pid} status=finished")));
    assert!(listing.contains("returncode=4"));

    let active = run(tmp.path(), &["runs", "--active"]);
    assert_ok(&active);
    assert_eq!(stdout(&active).trim(), "no runs");

    let show = run(tmp.path(), &["show", &pid]);
    assert_ok(&show);
    let json: serde_json::Value = serde_json::from_str(&stdout(&show)).expect("show json");
    assert_eq!(json["status"], "finished");
    assert_eq!(json["returncode"], 4);

    let tail = run(tmp.path(), &["tail", &pid, "--lines", "5"]);
    assert_ok(&tail);
    assert!(stdout(&tail).contains("hello-out"));
    assert!(stdout(&tail).contains("hello-err"));

    let stop = run(tmp.path(), &["stop", &pid]);
    assert_ok(&stop);
    assert!(stdout(&stop).contains("running=false"));

    let backup = run(tmp.path(), &["backup", "--keep", "2"]);
    assert_ok(&backup);
    let path = field(&stdout(&backup), "path");
    assert!(Path::new(&path).exists());
    assert!(path.starts_with(&tmp.path().join(".runboard/backups").display().to_string()));
}

#[test]
fn start_then_stop_a_background_process() {
    let tmp = tempdir().expect("tempdir");
    let started = run(tmp.path(), &["start", "--prefix", "bg", "--", "sleep", "30"]);
    assert_ok(&started);
    let text = stdout(&started);
    let pid = field(&text, "pid");
    assert!(field(&text, "stdout").ends_with(&format!("bg_pid_{pid}.out.log")));

    let active = run(tmp.path(), &["runs", "--active"]);
    assert_ok(&active);
    assert!(stdout(&active).contains(&format!("pid={pid} status=running")));

    let stopped = run(tmp.path(), &["stop", &pid, "--force-after", "1"]);
    assert_ok(&stopped);
    assert!(stdout(&stopped).starts_with("stopped"));

    let active = run(tmp.path(), &["runs", "--active"]);
    assert_ok(&active);
    assert_eq!(stdout(&active).trim(), "no runs");
}

#[test]
fn build_and_envs_read_settings() {
    let tmp = tempdir().expect("tempdir");
    let state_root = tmp.path().join(".runboard");
    fs::create_dir_all(&state_root).expect("state root");
    fs::write(
        state_root.join("config.yaml"),
        r#"
launcher:
  conda_env: analytics
  runners_package: jobs
environments:
  dev:
    api_url: http://localhost:8000
"#,
    )
    .expect("write config");

    let build = run(
        tmp.path(),
        &["build", "--module", "ingest", "--arg", "date=2024-05-01", "--flag", "dry_run"],
    );
    assert_ok(&build);
    assert_eq!(
        stdout(&build).trim(),
        "command=conda run -n analytics python -m jobs.ingest --date 2024-05-01 --dry_run"
    );

    let envs = run(tmp.path(), &["envs"]);
    assert_ok(&envs);
    assert_eq!(stdout(&envs).trim(), "dev");

    let dev = run(tmp.path(), &["envs", "dev"]);
    assert_ok(&dev);
    assert_eq!(stdout(&dev).trim(), "API_URL=http://localhost:8000");

    assert_err_contains(&run(tmp.path(), &["envs", "prod"]), "prod");
}
