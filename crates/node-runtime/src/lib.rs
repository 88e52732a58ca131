//! # Ledger Node Runtime
//!
//! Wires the ledger crates into one process and serves them over TCP.
//!
//! ```text
//!  TCP client ──line──→ [server] ──→ [lg-05 LedgerService]
//!                                        │            │
//!                               ordered  ↓            ↓ reads
//!                        [lg-03 InProcessCluster]  [lg-04 ReadStore]
//!                          n × [lg-01 ledger]          ↑
//!                                 │ local commits      │
//!                                 └──→ [Reconciler] ───┘
//! ```
//!
//! - `config` - TOML + `LEDGER_*` environment configuration
//! - `node` - startup, restore from snapshot, graceful shutdown
//! - `server` - line-delimited JSON listener

pub mod config;
pub mod node;
pub mod server;

pub use config::{ConfigError, NodeConfig};
pub use node::NodeRuntime;
pub use server::serve;
