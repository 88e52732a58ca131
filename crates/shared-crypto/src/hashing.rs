//! # Content Hashing
//!
//! SHA-256 backs every digest that crosses the wire (contract id derivation,
//! snapshot checksums, state digests). BLAKE3 is available for local,
//! non-protocol hashing where speed matters.

use sha2::{Digest, Sha256};

/// 256-bit digest.
pub type Hash = [u8; 32];

/// Selectable digest algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256 (default, protocol-visible).
    #[default]
    Sha256,
    /// BLAKE3.
    Blake3,
}

impl HashAlgorithm {
    /// Hash `data` with this algorithm.
    pub fn digest(self, data: &[u8]) -> Hash {
        match self {
            Self::Sha256 => sha256(data),
            Self::Blake3 => blake3_hash(data),
        }
    }
}

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash data with BLAKE3 (one-shot).
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Derive a contract identifier from caller-chosen seed parts.
///
/// The server never requires ids to be derived this way; it is a client
/// convenience (e.g. `sha256(email) ‖ timestamp`).
pub fn derive_contract_id(seed_parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in seed_parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
