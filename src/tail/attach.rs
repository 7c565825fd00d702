use super::merge_log_tails;
use super::MergedTail;
use crate::runtime::{append_runtime_log, LogPaths, ProcessTable, StatePaths};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const MIN_ATTACH_INTERVAL: Duration = Duration::from_millis(500);
const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Reads and forwards the logs of processes tracked in a [`ProcessTable`].
#[derive(Debug, Clone)]
pub struct LogTailer {
    table: Arc<ProcessTable>,
    paths: StatePaths,
}

impl LogTailer {
    pub fn new(table: Arc<ProcessTable>, paths: StatePaths) -> Self {
        Self { table, paths }
    }

    pub fn tail(&self, pid: u32, max_lines: usize) -> Option<MergedTail> {
        let logs = self.table.log_paths(pid)?;
        Some(merge_log_tails(&logs.stdout, &logs.stderr, max_lines))
    }

    /// Copies the current merged tail into the operational log once.
    pub fn attach_once(&self, pid: u32, max_lines: usize, label: Option<&str>) -> bool {
        let Some(tail) = self.tail(pid, max_lines) else {
            return false;
        };
        let header = header("ATTACH", pid, label);
        let text = tail.to_text();
        let message = if text.trim().is_empty() {
            format!("{header} (no output)")
        } else {
            format!("{header}\n{}", text.trim())
        };
        append_runtime_log(&self.paths, "info", "tail.attach", &message);
        true
    }

    pub fn enable_auto_attach(&self, pid: u32, label: Option<&str>, interval: Duration) -> bool {
        if self.table.tailer_active(pid) {
            return true;
        }
        let (Some(_), Some(logs)) = (self.table.process(pid), self.table.log_paths(pid)) else {
            return false;
        };
        let Some(stop) = self.table.claim_tailer(pid) else {
            return true;
        };

        let tail_loop = TailLoop {
            pid,
            header: header("TAIL", pid, label),
            interval: interval.max(MIN_ATTACH_INTERVAL),
            offsets: TailOffsets::at_end_of(&logs),
            logs,
            stop,
            table: Arc::clone(&self.table),
            paths: self.paths.clone(),
        };
        thread::spawn(move || tail_loop.run());
        append_runtime_log(
            &self.paths,
            "info",
            "tail.enabled",
            &format!("pid={pid} interval_ms={}", interval.max(MIN_ATTACH_INTERVAL).as_millis()),
        );
        true
    }

    pub fn disable_auto_attach(&self, pid: u32) -> bool {
        let stopped = self.table.stop_tailer(pid);
        if stopped {
            append_runtime_log(&self.paths, "info", "tail.disabled", &format!("pid={pid}"));
        }
        stopped
    }

    pub fn auto_attach_enabled(&self, pid: u32) -> bool {
        self.table.tailer_active(pid)
    }
}

fn header(kind: &str, pid: u32, label: Option<&str>) -> String {
    match label.map(str::trim).filter(|label| !label.is_empty()) {
        Some(label) => format!("[{kind}] PID={pid} {label}"),
        None => format!("[{kind}] PID={pid}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TailOffsets {
    stdout: u64,
    stderr: u64,
}

impl TailOffsets {
    fn at_end_of(logs: &LogPaths) -> Self {
        Self {
            stdout: file_len(&logs.stdout),
            stderr: file_len(&logs.stderr),
        }
    }
}

fn file_len(path: &Path) -> u64 {
    path.metadata().map(|meta| meta.len()).unwrap_or(0)
}

struct TailLoop {
    pid: u32,
    header: String,
    interval: Duration,
    offsets: TailOffsets,
    logs: LogPaths,
    stop: Arc<AtomicBool>,
    table: Arc<ProcessTable>,
    paths: StatePaths,
}

impl TailLoop {
    fn run(mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            // Checked before reading so the final pass sees everything the
            // process wrote.
            let exited = self
                .table
                .process(self.pid)
                .map(|process| process.has_exited())
                .unwrap_or(true);

            let mut chunks = Vec::new();
            for (path, offset) in [
                (&self.logs.stdout, &mut self.offsets.stdout),
                (&self.logs.stderr, &mut self.offsets.stderr),
            ] {
                match read_new_output(path, offset, exited) {
                    Ok(Some(text)) => chunks.push(text),
                    Ok(None) => {}
                    Err(err) => append_runtime_log(
                        &self.paths,
                        "warn",
                        "tail.read_failed",
                        &format!("pid={} path={} error={err}", self.pid, path.display()),
                    ),
                }
            }
            if !chunks.is_empty() {
                append_runtime_log(
                    &self.paths,
                    "info",
                    "tail.forward",
                    &format!("{}\n{}", self.header, chunks.join("\n")),
                );
            }
            if exited {
                break;
            }
            self.sleep_interval();
        }
        self.table.release_tailer(self.pid, &self.stop);
    }

    fn sleep_interval(&self) {
        let deadline = Instant::now() + self.interval;
        while !self.stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(STOP_CHECK_SLICE.min(deadline - now));
        }
    }
}

/// Reads bytes appended since `offset`. Unless `flush_partial` is set only
/// complete lines are consumed; the offset advances past the last newline.
fn read_new_output(path: &Path, offset: &mut u64, flush_partial: bool) -> io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let len = file.metadata()?.len();
    if len < *offset {
        // truncated
        *offset = 0;
    }
    if len == *offset {
        return Ok(None);
    }

    file.seek(SeekFrom::Start(*offset))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let consumed = if flush_partial {
        buffer.len()
    } else {
        match buffer.iter().rposition(|byte| *byte == b'\n') {
            Some(idx) => idx + 1,
            None => return Ok(None),
        }
    };
    *offset += consumed as u64;

    let text = String::from_utf8_lossy(&buffer[..consumed]);
    let text = text.trim_end_matches(['\n', '\r']);
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text.to_string()))
}
