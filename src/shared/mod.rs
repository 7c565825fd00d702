pub mod time;

pub use time::{compact_stamp, now_iso_seconds, now_secs};
