pub mod canonical;
pub mod errors;
pub mod policy;
pub mod replay;

pub use canonical::*;
pub use errors::*;
pub use policy::*;
pub use replay::*;
