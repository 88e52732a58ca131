//! # Shared Types Crate
//!
//! Domain entities, the replication wire codec, and the caller-facing error
//! taxonomy shared by every ledger crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: commands, results and audit entries are
//!   defined once here and used by the state machine, the read store and the
//!   facade alike.
//! - **Deterministic Encoding**: everything that crosses the replication
//!   boundary goes through [`codec`], so replicas see identical bytes.

pub mod codec;
pub mod entities;
pub mod errors;

pub use codec::{decode, encode, PROTOCOL_VERSION};
pub use entities::*;
pub use errors::*;
