//! Read store backends.
//!
//! Enable the `rocksdb` feature for the durable backend:
//!
//! ```toml
//! lg-04-read-store = { path = "...", features = ["rocksdb"] }
//! ```

pub mod memory;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use memory::InMemoryReadStore;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{
    RocksDbReadStore, RocksDbStoreConfig, CF_AUDIT, CF_CONTRACTS, CF_META, COLUMN_FAMILIES,
};
