use shared_types::{CodecError, LedgerError};
use thiserror::Error;

use super::ReplicaId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// No matching quorum of replies (including the local replica's) arrived
    /// in time. The command may or may not have committed.
    #[error("No quorum after {waited_ms}ms: best {best} of {required} matching replies")]
    ExecutionUncertain {
        waited_ms: u64,
        best: usize,
        required: usize,
    },

    /// The ordering service is not accepting submissions.
    #[error("Replication unavailable: {0}")]
    Unavailable(String),

    /// Submitted bytes did not decode.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Replica {0} not found")]
    ReplicaNotFound(ReplicaId),

    #[error("State transfer failed: {0}")]
    StateTransfer(String),

    #[error("Invalid cluster configuration: {0}")]
    InvalidConfig(String),
}

impl From<ReplicationError> for LedgerError {
    fn from(err: ReplicationError) -> Self {
        match err {
            ReplicationError::ExecutionUncertain { .. } => Self::ExecutionUncertain(err.to_string()),
            ReplicationError::Unavailable(msg) => Self::Unavailable(msg),
            ReplicationError::Codec(e) => Self::InvalidRequest(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
