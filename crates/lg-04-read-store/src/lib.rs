//! # lg-04-read-store
//!
//! Eventually-consistent projection of committed ledger results.
//!
//! ## Role in System
//!
//! - **Persistence boundary**: [`ReadStore`] with balance upserts, contract
//!   registration, audit appends and aggregate queries
//! - **Ordered write-through**: one [`Reconciler`] task per node applies
//!   projections in commit order, retrying a failing store forever
//! - **Audit log**: one entry per successful command, used for extracts
//!
//! ```text
//! [lg-03 local replica] ──CommitEvent──→ [Reconciler] ──→ [ReadStore]
//!                                                              ↑
//!                              [lg-05 facade] ──extract/ledger/total──┘
//! ```
//!
//! The store is never consulted for a debit or credit decision; the state
//! machine stays authoritative.

pub mod adapters;
pub mod domain;
pub mod ports;
mod service;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
pub use service::{Reconciler, ReconcilerConfig};
