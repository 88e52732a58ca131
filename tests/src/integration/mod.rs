//! Cross-crate integration scenarios.

pub mod determinism;
pub mod recovery;
pub mod replay;
pub mod rpc;
pub mod scenarios;
