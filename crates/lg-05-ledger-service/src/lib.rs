//! # lg-05-ledger-service
//!
//! The ledger's public operations, in front of the replication boundary.
//!
//! ```text
//! request ──→ [keys from local replica] ──→ [EnvelopeVerifier]
//!                                                 │ ok
//!                                                 ↓
//!               [ResponseSigner] ←── result ── [ReplicationBoundary]
//!                      │                          (ordered, quorum)
//!                      ↓
//!                  response          reads: extract / total / ledger
//!                                    come from the read store
//! ```
//!
//! Mutations never bypass ordering. A request whose envelope fails is
//! never submitted.

pub mod domain;
pub mod ports;
pub mod rpc;
mod service;

pub use domain::*;
pub use ports::*;
pub use rpc::{dispatch, handle_line, RpcError, RpcRequest, RpcResponse};
pub use service::LedgerService;
