use shared_types::{CodecError, Sequence};
use thiserror::Error;

/// Errors outside the deterministic apply path: snapshot handling and
/// snapshot persistence. Ledger-semantic failures are `ApplyRejection`s.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Snapshot too short: {len} bytes")]
    SnapshotTruncated { len: usize },

    #[error("Unsupported snapshot version: received {received}, supported {supported}")]
    SnapshotVersion { received: u8, supported: u8 },

    #[error("Snapshot checksum mismatch")]
    SnapshotChecksumMismatch,

    #[error("Snapshot content invalid: {0}")]
    SnapshotInvalid(String),

    #[error("Snapshot for sequence {sequence} not found")]
    SnapshotNotFound { sequence: Sequence },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Snapshot storage error: {0}")]
    StorageError(String),
}

impl From<CodecError> for StateError {
    fn from(err: CodecError) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
