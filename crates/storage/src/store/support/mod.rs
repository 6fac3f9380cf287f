#![forbid(unsafe_code)]

mod schema;
mod time;

pub(super) use self::schema::install_schema;
pub(super) use self::time::now_ms;
