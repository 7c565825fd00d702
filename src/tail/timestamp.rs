use chrono::NaiveDateTime;

const ISO_LEN: usize = 19;
const COMPACT_LEN: usize = 15;

/// Parses a timestamp at the start of a log line, after leading whitespace.
///
/// Accepted shapes: `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYYMMDD-HHMMSS`. Anything after the timestamp is ignored.
pub fn parse_leading_timestamp(line: &str) -> Option<NaiveDateTime> {
    let trimmed = line.trim_start();
    let bytes = trimmed.as_bytes();

    if bytes.len() >= ISO_LEN && has_iso_shape(&bytes[..ISO_LEN]) {
        let format = if bytes[10] == b'T' {
            "%Y-%m-%dT%H:%M:%S"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        return NaiveDateTime::parse_from_str(&trimmed[..ISO_LEN], format).ok();
    }
    if bytes.len() >= COMPACT_LEN && has_compact_shape(&bytes[..COMPACT_LEN]) {
        return NaiveDateTime::parse_from_str(&trimmed[..COMPACT_LEN], "%Y%m%d-%H%M%S").ok();
    }
    None
}

fn has_iso_shape(head: &[u8]) -> bool {
    head.iter().enumerate().all(|(idx, byte)| match idx {
        4 | 7 => *byte == b'-',
        10 => *byte == b' ' || *byte == b'T',
        13 | 16 => *byte == b':',
        _ => byte.is_ascii_digit(),
    })
}

fn has_compact_shape(head: &[u8]) -> bool {
    head.iter().enumerate().all(|(idx, byte)| match idx {
        8 => *byte == b'-',
        _ => byte.is_ascii_digit(),
    })
}
