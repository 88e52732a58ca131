pub mod api;
pub mod outbound;

pub use api::*;
pub use outbound::*;
