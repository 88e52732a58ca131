//! # ECDSA Signatures (secp256k1)
//!
//! Client and service signatures over canonical request/response bytes.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - SHA-256 message digest
//! - High-S signatures from foreign signers are normalized before verification
//!
//! Public keys travel as SEC1 bytes (compressed 33 or uncompressed 65).
//! Signatures are accepted as DER or fixed 64-byte `r || s`, and produced as
//! fixed 64-byte `r || s`.

use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Parse SEC1 bytes (compressed or uncompressed) into a compressed key.
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        let point = verifying_key.to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        Ok(Self(out))
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Owned copy of the compressed bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Verify a signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        verify_signature(message, signature, &self.0)
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a secret key slice, e.g. decoded from configuration.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(point.as_bytes());
        Secp256k1PublicKey(bytes)
    }

    /// Sign a message (deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Secp256k1Signature(bytes)
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Parse a signature from either fixed `r || s` or DER encoding.
fn parse_signature(signature: &[u8]) -> Result<Signature, CryptoError> {
    let sig = if signature.len() == 64 {
        Signature::from_slice(signature)
    } else {
        Signature::from_der(signature)
    }
    .map_err(|_| CryptoError::InvalidSignatureFormat)?;
    Ok(sig.normalize_s().unwrap_or(sig))
}

/// Verify `signature` over `message` with SEC1-encoded `public_key`.
///
/// Malformed keys and signatures are errors, never treated as valid.
pub fn verify_signature(
    message: &[u8],
    signature: &[u8],
    public_key: &[u8],
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = parse_signature(signature)?;

    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let message = b"contract-1 load 1000";

        let signature = keypair.sign(message);
        let result = keypair.public_key().verify(message, signature.as_bytes());

        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Secp256k1KeyPair::generate();

        let signature = keypair.sign(b"message1");
        let result = keypair.public_key().verify(b"message2", signature.as_bytes());

        assert_eq!(result, Err(CryptoError::SignatureVerificationFailed));
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = Secp256k1KeyPair::generate();
        let keypair2 = Secp256k1KeyPair::generate();

        let signature = keypair1.sign(b"test");
        let result = keypair2.public_key().verify(b"test", signature.as_bytes());

        assert!(result.is_err());
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let keypair = Secp256k1KeyPair::generate();
        let mut bytes = *keypair.sign(b"payload").as_bytes();
        bytes[10] ^= 0x01;

        let result = keypair.public_key().verify(b"payload", &bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_der_signature_accepted() {
        let keypair = Secp256k1KeyPair::from_bytes([0x11u8; 32]).unwrap();
        let sig: Signature = keypair.signing_key.sign(b"der message");
        let der = sig.to_der();

        let result = verify_signature(b"der message", der.as_bytes(), keypair.public_key().as_bytes());
        assert!(result.is_ok());
    }

    #[test]
    fn test_uncompressed_key_accepted() {
        let keypair = Secp256k1KeyPair::generate();
        let uncompressed = keypair.signing_key.verifying_key().to_encoded_point(false);
        let signature = keypair.sign(b"abc");

        assert!(verify_signature(b"abc", signature.as_bytes(), uncompressed.as_bytes()).is_ok());
        let parsed = Secp256k1PublicKey::from_sec1(uncompressed.as_bytes()).unwrap();
        assert_eq!(parsed, keypair.public_key());
    }

    #[test]
    fn test_garbage_key_rejected() {
        let result = verify_signature(b"m", &[0u8; 64], &[0x05; 33]);
        assert_eq!(result, Err(CryptoError::InvalidPublicKey));
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let message = b"deterministic test";

        let sig1 = keypair.sign(message);
        let sig2 = keypair.sign(message);

        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = Secp256k1KeyPair::generate();
        let bytes = original.to_bytes();
        let restored = Secp256k1KeyPair::from_slice(&bytes).unwrap();

        assert_eq!(original.public_key(), restored.public_key());
    }
}
