pub mod config;
pub mod phase;

pub use config::*;
pub use phase::*;
