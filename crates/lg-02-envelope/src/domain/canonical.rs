//! # Canonical Message Bytes
//!
//! The signed/MAC'd payload of every request and response is a fixed-order
//! concatenation of raw field bytes: ids as their decoded bytes, amounts as
//! 8-byte big-endian, nonces and text as UTF-8. No separators, no lengths.
//! Client and service must build the same bytes or verification fails.

use shared_types::{ContractId, ContractKeys};

/// Incremental builder for canonical bytes.
#[derive(Debug, Default, Clone)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract(mut self, id: &ContractId) -> Self {
        self.0.extend_from_slice(id.as_bytes());
        self
    }

    pub fn contracts(self, ids: &[ContractId]) -> Self {
        ids.iter().fold(self, Self::contract)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn amount(mut self, value: i64) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn text(mut self, value: &str) -> Self {
        self.0.extend_from_slice(value.as_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.0
    }
}

/// A message whose authenticity is carried by canonical bytes.
pub trait Canonical {
    fn canonical_bytes(&self) -> Vec<u8>;
}

/// A client request carrying a signature and optional MAC.
pub trait SignedRequest: Canonical {
    /// Operation name, for logs.
    fn operation(&self) -> &'static str;

    /// Contract whose on-record keys verify this request.
    fn signer(&self) -> &ContractId;

    fn signature(&self) -> &[u8];

    fn mac(&self) -> Option<&[u8]>;

    /// Single-use token, for value-transferring requests.
    fn nonce(&self) -> Option<&str> {
        None
    }

    /// Keys asserted by the request itself. Only contract creation has
    /// these, since no record exists yet.
    fn asserted_keys(&self) -> Option<ContractKeys> {
        None
    }
}
