//! # Envelope Verifier
//!
//! Fail-fast, side-effect free until the last step:
//!
//! 1. Recompute canonical bytes from the request fields.
//! 2. MAC (per policy) against the contract's secret.
//! 3. Signature against the contract's public key.
//! 4. Nonce check-and-insert.

use shared_crypto::{verify_mac, verify_signature};
use shared_types::ContractKeys;
use tracing::debug;

use crate::domain::{
    EnvelopeError, MacRequirement, NonceRetention, ReplayGuard, SignedRequest,
    VerificationPolicy,
};

/// The parts of a request that carry authenticity.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParts<'a> {
    pub canonical: &'a [u8],
    pub signature: &'a [u8],
    pub mac: Option<&'a [u8]>,
    pub nonce: Option<&'a str>,
}

pub struct EnvelopeVerifier {
    policy: VerificationPolicy,
    replay: ReplayGuard,
}

impl EnvelopeVerifier {
    pub fn new(policy: VerificationPolicy, retention: NonceRetention) -> Self {
        Self {
            policy,
            replay: ReplayGuard::new(retention),
        }
    }

    pub fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    /// Verify a request against `keys`.
    pub fn verify<R>(&self, request: &R, keys: &ContractKeys) -> Result<(), EnvelopeError>
    where
        R: SignedRequest + ?Sized,
    {
        let canonical = request.canonical_bytes();
        let result = self.verify_parts(
            EnvelopeParts {
                canonical: &canonical,
                signature: request.signature(),
                mac: request.mac(),
                nonce: request.nonce(),
            },
            keys,
        );
        if let Err(e) = &result {
            debug!(
                operation = request.operation(),
                contract = %request.signer(),
                error = %e,
                "Envelope rejected"
            );
        }
        result
    }

    /// Verify pre-built envelope parts against `keys`.
    pub fn verify_parts(
        &self,
        parts: EnvelopeParts<'_>,
        keys: &ContractKeys,
    ) -> Result<(), EnvelopeError> {
        self.check_mac(&parts, keys)?;

        verify_signature(parts.canonical, parts.signature, &keys.public_key)
            .map_err(|e| EnvelopeError::Authentication(e.to_string()))?;

        if let (Some(nonce), true) = (parts.nonce, self.policy.replay_protection) {
            self.replay.check_and_insert(nonce)?;
        }
        Ok(())
    }

    fn check_mac(&self, parts: &EnvelopeParts<'_>, keys: &ContractKeys) -> Result<(), EnvelopeError> {
        let secret = keys.shared_secret.as_deref();
        match (self.policy.mac, parts.mac, secret) {
            (_, None, None) | (MacRequirement::IfPresent, None, Some(_)) => Ok(()),
            (MacRequirement::Required, None, Some(_)) => {
                Err(EnvelopeError::Integrity("missing MAC".into()))
            }
            (_, Some(_), None) => Err(EnvelopeError::Integrity(
                "MAC sent but no shared secret on record".into(),
            )),
            (_, Some(tag), Some(secret)) => verify_mac(parts.canonical, tag, secret)
                .map_err(|e| EnvelopeError::Integrity(e.to_string())),
        }
    }
}
