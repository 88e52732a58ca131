//! # Verification Policy
//!
//! One configurable set of checks replaces separate signature-only and
//! HMAC-augmented code paths. Signatures are always verified.

use std::str::FromStr;

use super::EnvelopeError;

/// How request MACs are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRequirement {
    /// A MAC, when sent, must verify against the contract's secret.
    IfPresent,
    /// Contracts with a secret on record must send a valid MAC; contracts
    /// without one must not send a MAC.
    Required,
}

/// Set of enabled envelope checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub mac: MacRequirement,
    /// Check-and-insert nonces of value-transferring requests.
    pub replay_protection: bool,
    /// Attach a MAC to responses for contracts that hold a secret.
    pub mac_responses: bool,
}

impl VerificationPolicy {
    /// Signature + nonce. A MAC is optional but still checked when sent.
    pub const fn signature_only() -> Self {
        Self {
            mac: MacRequirement::IfPresent,
            replay_protection: true,
            mac_responses: false,
        }
    }

    /// Signature + MAC + nonce, MAC'd responses.
    pub const fn hmac_augmented() -> Self {
        Self {
            mac: MacRequirement::Required,
            replay_protection: true,
            mac_responses: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.mac {
            MacRequirement::IfPresent => "signature",
            MacRequirement::Required => "signature+hmac",
        }
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::signature_only()
    }
}

impl FromStr for VerificationPolicy {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signature" | "signature-only" => Ok(Self::signature_only()),
            "signature+hmac" | "hmac" | "hmac-augmented" => Ok(Self::hmac_augmented()),
            other => Err(EnvelopeError::InvalidConfig(format!(
                "unknown verification policy '{other}'"
            ))),
        }
    }
}
