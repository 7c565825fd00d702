use super::parse_leading_timestamp;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const READ_BLOCK: u64 = 64 * 1024;

/// Stream tag used to break timestamp ties; stderr sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stream {
    Stderr,
    Stdout,
}

/// Merged view of the last lines of a run's two log files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTail {
    lines: Vec<String>,
}

impl MergedTail {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn merge_log_tails(stdout_path: &Path, stderr_path: &Path, max_lines: usize) -> MergedTail {
    let stdout = read_last_lines(stdout_path, max_lines);
    let stderr = read_last_lines(stderr_path, max_lines);
    MergedTail {
        lines: merge_lines(&stdout, &stderr),
    }
}

/// Orders lines by their leading timestamp when any line carries one,
/// otherwise interleaves the two streams starting with stdout.
pub fn merge_lines(stdout: &[String], stderr: &[String]) -> Vec<String> {
    let mut keyed: Vec<_> = stdout
        .iter()
        .enumerate()
        .map(|(idx, line)| (Stream::Stdout, idx, line))
        .chain(
            stderr
                .iter()
                .enumerate()
                .map(|(idx, line)| (Stream::Stderr, idx, line)),
        )
        .map(|(stream, idx, line)| (parse_leading_timestamp(line), stream, idx, line))
        .collect();

    if keyed.iter().any(|(ts, ..)| ts.is_some()) {
        keyed.sort_by(|a, b| {
            (a.0.is_none(), a.0, a.1, a.2).cmp(&(b.0.is_none(), b.0, b.1, b.2))
        });
        return keyed.into_iter().map(|(.., line)| line.clone()).collect();
    }

    let mut merged = Vec::with_capacity(stdout.len() + stderr.len());
    for idx in 0..stdout.len().max(stderr.len()) {
        if let Some(line) = stdout.get(idx) {
            merged.push(line.clone());
        }
        if let Some(line) = stderr.get(idx) {
            merged.push(line.clone());
        }
    }
    merged
}

/// Returns up to `max_lines` trailing lines of `path` without their newline.
/// Missing or unreadable files yield no lines; invalid UTF-8 is replaced.
pub fn read_last_lines(path: &Path, max_lines: usize) -> Vec<String> {
    if max_lines == 0 {
        return Vec::new();
    }
    let Ok(bytes) = read_tail_bytes(path, max_lines) else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].iter().map(|line| line.to_string()).collect()
}

/// Reads backwards from the end of the file in blocks until enough line
/// breaks have been seen to cover `max_lines` lines.
fn read_tail_bytes(path: &Path, max_lines: usize) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut start = len;
    let mut buffer: Vec<u8> = Vec::new();

    while start > 0 {
        let step = READ_BLOCK.min(start);
        start -= step;
        file.seek(SeekFrom::Start(start))?;
        let mut block = vec![0u8; step as usize];
        file.read_exact(&mut block)?;
        block.extend_from_slice(&buffer);
        buffer = block;

        let breaks = buffer.iter().filter(|byte| **byte == b'\n').count();
        if breaks > max_lines {
            break;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn timestamped_lines_are_ordered_across_streams() {
        let stdout = owned(&["2024-05-01 10:00:00 a", "2024-05-01 10:00:02 b"]);
        let stderr = owned(&["2024-05-01 10:00:01 x", "2024-05-01 10:00:03 y"]);
        assert_eq!(
            merge_lines(&stdout, &stderr),
            owned(&[
                "2024-05-01 10:00:00 a",
                "2024-05-01 10:00:01 x",
                "2024-05-01 10:00:02 b",
                "2024-05-01 10:00:03 y",
            ])
        );
    }

    #[test]
    fn untimestamped_lines_interleave_with_remainder() {
        assert_eq!(
            merge_lines(&owned(&["a", "b"]), &owned(&["x", "y"])),
            owned(&["a", "x", "b", "y"])
        );
        assert_eq!(
            merge_lines(&owned(&["a", "b", "c"]), &owned(&["x"])),
            owned(&["a", "x", "b", "c"])
        );
        assert!(merge_lines(&[], &[]).is_empty());
    }

    #[test]
    fn stderr_wins_ties_and_unparsed_lines_go_last() {
        let stdout = owned(&["2024-05-01 10:00:00 out", "plain out"]);
        let stderr = owned(&["Traceback", "2024-05-01 10:00:00 err"]);
        assert_eq!(
            merge_lines(&stdout, &stderr),
            owned(&[
                "2024-05-01 10:00:00 err",
                "2024-05-01 10:00:00 out",
                "Traceback",
                "plain out",
            ])
        );
    }

    #[test]
    fn last_lines_are_bounded_and_missing_files_are_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("run.out.log");
        let body: String = (0..500).map(|n| format!("line {n}\n")).collect();
        fs::write(&path, body).expect("write log");

        let lines = read_last_lines(&path, 3);
        assert_eq!(lines, owned(&["line 497", "line 498", "line 499"]));
        assert!(read_last_lines(&dir.path().join("absent.log"), 3).is_empty());
        assert!(read_last_lines(&path, 0).is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced_and_partial_last_line_is_kept() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("run.err.log");
        fs::write(&path, b"ok\nbad \xff byte\npartial").expect("write log");

        let lines = read_last_lines(&path, 10);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].contains('\u{fffd}'));
        assert_eq!(lines[2], "partial");
    }

    #[test]
    fn merged_tail_joins_with_newlines() {
        let dir = tempdir().expect("tempdir");
        let out = dir.path().join("a.out.log");
        let err = dir.path().join("a.err.log");
        fs::write(&out, "one\ntwo\n").expect("write out");
        fs::write(&err, "warn\n").expect("write err");

        let tail = merge_log_tails(&out, &err, 200);
        assert_eq!(tail.lines(), owned(&["one", "warn", "two"]).as_slice());
        assert_eq!(tail.to_text(), "one\nwarn\ntwo");
    }
}
