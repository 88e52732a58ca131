pub mod errors;
pub mod ledger;
pub mod snapshot;

pub use errors::*;
pub use ledger::*;
pub use snapshot::*;
