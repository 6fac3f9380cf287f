#![forbid(unsafe_code)]

mod canonical;
mod classify;
mod criteria;
mod fields;
mod status_map;
mod text;

pub use canonical::*;
pub use classify::*;
pub use criteria::*;
pub use fields::*;
pub use status_map::*;
pub use text::*;
