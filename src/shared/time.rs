use chrono::Local;
use std::time::{SystemTime, UNIX_EPOCH};

pub const ISO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const COMPACT_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Local wall-clock time with second precision, e.g. `2024-05-01T10:00:00`.
pub fn now_iso_seconds() -> String {
    Local::now().format(ISO_SECONDS_FORMAT).to_string()
}

/// Local wall-clock time in the `YYYYMMDD-HHMMSS` form used for log prefixes.
pub fn compact_stamp() -> String {
    Local::now().format(COMPACT_STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn iso_seconds_parses_back_without_fractional_part() {
        let stamp = now_iso_seconds();
        assert_eq!(stamp.len(), 19);
        NaiveDateTime::parse_from_str(&stamp, ISO_SECONDS_FORMAT).expect("parse iso stamp");
    }

    #[test]
    fn compact_stamp_uses_dash_separator() {
        let stamp = compact_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'-');
    }
}
