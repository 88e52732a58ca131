pub mod errors;
pub mod projection;

pub use errors::*;
pub use projection::*;
