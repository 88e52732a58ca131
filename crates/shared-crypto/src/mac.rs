//! # HMAC-SHA256
//!
//! Keyed integrity tags over canonical message bytes, used when a contract
//! has a shared secret on record.
//!
//! Tag comparison goes through `Mac::verify_slice`, which is constant-time.

use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag.
pub const MAC_LEN: usize = 32;

/// Per-contract shared secret, wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wrap secret bytes. Empty secrets are rejected.
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.is_empty() {
            return Err(CryptoError::InvalidMacKey("empty secret".into()));
        }
        Ok(Self(bytes))
    }

    /// Generate a random 32-byte secret.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

fn keyed(secret: &[u8]) -> Result<HmacSha256, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidMacKey("empty secret".into()));
    }
    HmacSha256::new_from_slice(secret).map_err(|e| CryptoError::InvalidMacKey(e.to_string()))
}

/// Compute the HMAC-SHA256 tag of `message` under `secret`.
pub fn compute_mac(message: &[u8], secret: &[u8]) -> Result<[u8; MAC_LEN], CryptoError> {
    let mut mac = keyed(secret)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Verify `tag` over `message` under `secret` in constant time.
pub fn verify_mac(message: &[u8], tag: &[u8], secret: &[u8]) -> Result<(), CryptoError> {
    let mut mac = keyed(secret)?;
    mac.update(message);
    mac.verify_slice(tag)
        .map_err(|_| CryptoError::MacVerificationFailed)
}
