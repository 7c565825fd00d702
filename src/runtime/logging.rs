use super::StatePaths;
use crate::shared::now_secs;
use std::fs;
use std::io::Write;

/// Appends one JSON line to the operational log. Logging never fails the
/// caller; write errors are dropped.
pub fn append_runtime_log(paths: &StatePaths, level: &str, event: &str, message: &str) {
    let payload = serde_json::json!({
        "timestamp": now_secs(),
        "level": level,
        "event": event,
        "message": message,
    });

    let Ok(line) = serde_json::to_string(&payload) else {
        return;
    };

    let path = paths.runtime_log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RuntimeLogEntry {
    pub timestamp: i64,
    pub level: String,
    pub event: String,
    pub message: String,
}

/// Reads back the operational log, skipping lines that are not valid entries.
pub fn read_runtime_log(paths: &StatePaths) -> Vec<RuntimeLogEntry> {
    let Ok(raw) = fs::read_to_string(paths.runtime_log_path()) else {
        return Vec::new();
    };
    raw.lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
