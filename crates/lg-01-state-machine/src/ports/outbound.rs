use shared_types::Sequence;

use crate::domain::StateError;

/// Durable home for snapshot bytes.
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot taken at `sequence`.
    fn save(&self, sequence: Sequence, bytes: &[u8]) -> Result<(), StateError>;

    /// Latest persisted snapshot, if any.
    fn load_latest(&self) -> Result<Option<(Sequence, Vec<u8>)>, StateError>;
}
