//! # lg-01-state-machine
//!
//! Deterministic ledger state machine for the replicated ledger.
//!
//! ## Role in System
//!
//! - **Single Source of Truth**: authoritative contract → balance map
//! - **Deterministic Apply**: identical command sequences give bit-identical
//!   state on every replica
//! - **State Transfer**: checksummed snapshots for replica bootstrap and
//!   crash recovery
//!
//! ```text
//! [Replication Boundary] ──ordered Command──→ apply_ordered ──→ CommandResult
//!                        ──Query───────────→ apply_unordered ─→ QueryResult
//!                        ──snapshot bytes──→ install_snapshot
//! ```
//!
//! The host (see `lg-03-replication`) depends only on the
//! [`ReplicatedStateMachine`] capability.

pub mod adapters;
pub mod domain;
pub mod ports;
mod service;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
