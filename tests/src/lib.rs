//! # Ledger-BFT Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # In-process ledger + client helpers
//! └── integration/      # Cross-crate scenarios
//!     ├── scenarios.rs  # Client-visible flows through the service
//!     ├── determinism.rs# Replicas agree on every prefix
//!     ├── replay.rs     # Concurrent nonce reuse
//!     ├── recovery.rs   # State transfer and restart
//!     └── rpc.rs        # JSON dispatch end to end
//! tests/benches/        # criterion benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ledger-tests
//! cargo test -p ledger-tests integration::replay::
//! cargo bench -p ledger-tests
//! ```

pub mod fixtures;
pub mod integration;
