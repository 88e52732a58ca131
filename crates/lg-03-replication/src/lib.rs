//! # lg-03-replication
//!
//! The replication boundary: how the ledger hands commands to a
//! Byzantine-fault-tolerant total-order primitive and gets agreed results
//! back.
//!
//! ## Role in System
//!
//! - **Ordered path**: every state-changing command is sequenced once and
//!   delivered to all replicas in the same order
//! - **Unordered path**: read-only queries are answered by the local replica
//!   without agreement
//! - **State transfer**: lagging replicas are rebuilt from a peer's snapshot
//!
//! ```text
//! [Ledger Facade] ──encoded Command──→ ReplicationBoundary::submit_ordered
//!                                         │
//!                                  [InProcessCluster]
//!                                         │ Deliver(seq)
//!                          ┌──────────────┼──────────────┐
//!                      replica 0      replica 1  ...  replica n-1
//!                          │
//!                          └──CommitEvent──→ [Read Store Reconciler]
//! ```
//!
//! The cluster tolerates `f = (n - 1) / 3` faulty replicas. An ordered
//! submission completes with `f + 1` matching replies by default.

pub mod cluster;
pub mod domain;
pub mod ports;
pub mod replica;

pub use cluster::InProcessCluster;
pub use domain::*;
pub use ports::*;
pub use replica::{ReplicaHandle, SharedMachine};
