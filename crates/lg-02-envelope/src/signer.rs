use shared_crypto::{compute_mac, Secp256k1KeyPair};

use crate::domain::{Canonical, EnvelopeError, VerificationPolicy};
use crate::wire::Signed;

/// Seals responses with the service key pair (and the contract's secret,
/// when the policy asks for response MACs).
pub struct ResponseSigner {
    keypair: Secp256k1KeyPair,
    policy: VerificationPolicy,
}

impl ResponseSigner {
    pub fn new(keypair: Secp256k1KeyPair, policy: VerificationPolicy) -> Self {
        Self { keypair, policy }
    }

    /// Compressed SEC1 public key of the service.
    pub fn public_key(&self) -> Vec<u8> {
        self.keypair.public_key().to_vec()
    }

    pub fn seal<T: Canonical>(
        &self,
        body: T,
        secret: Option<&[u8]>,
    ) -> Result<Signed<T>, EnvelopeError> {
        let canonical = body.canonical_bytes();
        let signature = self.keypair.sign(&canonical).as_bytes().to_vec();
        let mac = match secret {
            Some(secret) if self.policy.mac_responses => Some(
                compute_mac(&canonical, secret)
                    .map_err(|e| EnvelopeError::Sealing(e.to_string()))?
                    .to_vec(),
            ),
            _ => None,
        };
        Ok(Signed {
            body,
            signature,
            mac,
        })
    }
}
