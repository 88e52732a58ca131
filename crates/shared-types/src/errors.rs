//! # Error Types
//!
//! `CodecError` covers wire decoding. `LedgerError` is the caller-facing
//! taxonomy every RPC answer is mapped onto.

use thiserror::Error;

use crate::entities::ApplyRejection;

/// Wire encoding/decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Leading protocol version byte did not match.
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion {
        /// Version found in the payload.
        received: u8,
        /// Version this build speaks.
        supported: u8,
    },

    /// Payload was empty.
    #[error("Empty payload")]
    EmptyPayload,

    /// bincode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Field was not valid base64.
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Contract ids must decode to at least one byte.
    #[error("Contract id must not be empty")]
    EmptyContractId,
}

/// Caller-facing ledger error.
///
/// The first three variants are protocol-boundary failures raised before any
/// state mutation. The ledger-semantic variants come from the deterministic
/// apply step and are authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Bad signature or unusable public key.
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Bad MAC.
    #[error("Integrity failure: {0}")]
    IntegrityFailure(String),

    /// Nonce already admitted.
    #[error("Replay failure: nonce {0} already used")]
    ReplayFailure(String),

    /// Contract id already registered.
    #[error("Contract already exists")]
    ContractAlreadyExists,

    /// Referenced contract not registered.
    #[error("Contract does not exist")]
    ContractDoesNotExist,

    /// Origin balance below the transfer amount.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Credit would overflow the balance range.
    #[error("Balance overflow")]
    BalanceOverflow,

    /// The replication boundary did not deliver a result in time. The
    /// command may or may not have committed.
    #[error("Execution uncertain: {0}")]
    ExecutionUncertain(String),

    /// Malformed request (bad encoding, non-positive amount, empty list).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The boundary refused the submission before ordering.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Local failure unrelated to the request's validity.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "AUTHENTICATION_FAILURE",
            Self::IntegrityFailure(_) => "INTEGRITY_FAILURE",
            Self::ReplayFailure(_) => "REPLAY_FAILURE",
            Self::ContractAlreadyExists => "CONTRACT_ALREADY_EXISTS",
            Self::ContractDoesNotExist => "CONTRACT_DOES_NOT_EXIST",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::BalanceOverflow => "BALANCE_OVERFLOW",
            Self::ExecutionUncertain(_) => "EXECUTION_UNCERTAIN",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the failure was detected before anything was submitted.
    pub fn is_protocol_rejection(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailure(_)
                | Self::IntegrityFailure(_)
                | Self::ReplayFailure(_)
                | Self::InvalidRequest(_)
        )
    }
}

impl From<ApplyRejection> for LedgerError {
    fn from(rejection: ApplyRejection) -> Self {
        match rejection {
            ApplyRejection::ContractAlreadyExists => Self::ContractAlreadyExists,
            ApplyRejection::ContractDoesNotExist => Self::ContractDoesNotExist,
            ApplyRejection::InsufficientFunds => Self::InsufficientFunds,
            ApplyRejection::InvalidAmount => {
                Self::InvalidRequest("amount must be positive".into())
            }
            ApplyRejection::BalanceOverflow => Self::BalanceOverflow,
        }
    }
}

impl From<CodecError> for LedgerError {
    fn from(err: CodecError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
