pub mod config;
pub mod consts;
pub mod driver;
pub mod fuse;
pub mod io;
pub mod ops;
pub mod structure;
pub mod util;

pub use ops::SimpleFs;
pub use util::error::{Error, Result};
