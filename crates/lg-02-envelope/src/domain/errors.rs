use shared_types::LedgerError;
use thiserror::Error;

/// Envelope verification and sealing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// MAC missing, unexpected, or wrong.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Signature wrong or key material unusable.
    #[error("Authentication violation: {0}")]
    Authentication(String),

    /// Nonce already admitted.
    #[error("Replay violation: nonce {0} already used")]
    Replay(String),

    /// Replay window is full of live nonces.
    #[error("Replay guard at capacity ({0} live nonces)")]
    ReplayCapacity(usize),

    /// Unknown policy or retention name.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The service could not produce a tag.
    #[error("Sealing failed: {0}")]
    Sealing(String),
}

impl EnvelopeError {
    /// Metrics label for rejections.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Integrity(_) => "integrity",
            Self::Authentication(_) => "authentication",
            Self::Replay(_) => "replay",
            Self::ReplayCapacity(_) => "replay_capacity",
            Self::InvalidConfig(_) => "config",
            Self::Sealing(_) => "sealing",
        }
    }
}

impl From<EnvelopeError> for LedgerError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Integrity(msg) => Self::IntegrityFailure(msg),
            EnvelopeError::Authentication(msg) => Self::AuthenticationFailure(msg),
            EnvelopeError::Replay(nonce) => Self::ReplayFailure(nonce),
            EnvelopeError::ReplayCapacity(n) => {
                Self::Unavailable(format!("replay guard at capacity ({n})"))
            }
            EnvelopeError::InvalidConfig(msg) | EnvelopeError::Sealing(msg) => {
                Self::Internal(msg)
            }
        }
    }
}
