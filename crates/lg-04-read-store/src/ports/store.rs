//! Driven port: the durable, queryable projection of committed state.

use shared_types::{AuditEntry, ContractId, ContractRecord, Sequence};

use crate::domain::{Projection, StoreError};

/// Persistence boundary for the read side.
///
/// Implementations are blocking; async callers go through
/// `spawn_blocking`. The store is a derived view and never decides a
/// debit or credit.
pub trait ReadStore: Send + Sync {
    /// Set the balance of a known contract.
    fn upsert_balance(&self, id: &ContractId, balance: i64) -> Result<(), StoreError>;

    /// Register a contract with a zero balance. Re-inserting an existing id
    /// leaves the stored record untouched.
    fn insert_contract(
        &self,
        id: &ContractId,
        public_key: &[u8],
        shared_secret: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Sum of the listed balances; unknown ids count as zero.
    fn sum_balances(&self, ids: &[ContractId]) -> Result<i64, StoreError>;

    fn sum_all(&self) -> Result<i64, StoreError>;

    /// Every contract, ascending by id.
    fn list_all(&self) -> Result<Vec<(ContractId, ContractRecord)>, StoreError>;

    fn get_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, StoreError>;

    /// Audit entries naming `id` as origin or destination, in commit order.
    fn audit_for(&self, id: &ContractId) -> Result<Vec<AuditEntry>, StoreError>;

    /// Highest sequence whose projection has been applied.
    fn applied_sequence(&self) -> Result<Sequence, StoreError>;

    /// Apply all writes of one commit and advance the watermark, atomically.
    /// Returns `false` without writing if the sequence was already applied.
    fn apply_projection(&self, projection: &Projection) -> Result<bool, StoreError>;

    /// Replace every contract with `contracts` as of `sequence`. Audit
    /// history is kept. Returns `false` if the store is already at or past
    /// `sequence`.
    fn rebase(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<bool, StoreError>;

    /// Move the store back to `sequence`: contracts are replaced with
    /// `contracts` and audit entries past `sequence` are dropped. Used when
    /// the store outlived the state it was projected from.
    fn rewind(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<(), StoreError>;
}

pub(crate) fn checked_sum(balances: impl IntoIterator<Item = i64>) -> Result<i64, StoreError> {
    balances
        .into_iter()
        .try_fold(0i64, |acc, b| acc.checked_add(b))
        .ok_or(StoreError::SumOverflow)
}
