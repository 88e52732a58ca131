//! # Shared Crypto - Ledger Cryptographic Primitives
//!
//! Stateless functions over byte strings and keys.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 + SHA-256 | Client and service signatures |
//! | `mac` | HMAC-SHA256 | Shared-secret integrity tags |
//! | `hashing` | SHA-256, BLAKE3 | Contract ids, checksums, digests |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, high-S normalized on verify
//! - **HMAC**: constant-time tag comparison
//! - Malformed key material is always an error, never "valid"

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod mac;

// Re-exports
pub use ecdsa::{verify_signature, Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{blake3_hash, derive_contract_id, sha256, Hash, HashAlgorithm};
pub use mac::{compute_mac, verify_mac, SharedSecret, MAC_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
