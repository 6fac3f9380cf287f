#![forbid(unsafe_code)]

mod time;

pub(crate) use self::time::{now_ms, ts_ms_to_rfc3339};
