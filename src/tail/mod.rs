pub mod attach;
pub mod merge;
pub mod timestamp;

pub use attach::{LogTailer, MIN_ATTACH_INTERVAL};
pub use merge::{merge_lines, merge_log_tails, read_last_lines, MergedTail};
pub use timestamp::parse_leading_timestamp;
