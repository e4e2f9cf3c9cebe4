//! Presenter input: key bindings and the console backend feeding them

mod backend;
mod keys;

pub use backend::*;
pub use keys::{parse_line, Key};
