use shared_types::{ContractId, LedgerError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend refused or failed the operation.
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Stored value could not be decoded: {0}")]
    Corrupted(String),

    /// A balance update referenced a contract the store has never seen.
    #[error("Contract {0} is not in the read store")]
    MissingContract(ContractId),

    #[error("Balance sum overflows")]
    SumOverflow,

    /// The reconciler stopped before reaching the awaited sequence.
    #[error("Reconciler stopped at sequence {applied}")]
    ReconcilerStopped { applied: u64 },
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReconcilerStopped { .. } => Self::Unavailable(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
