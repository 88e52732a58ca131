use shared_crypto::Hash;
use shared_types::{Command, CommandResult, Query, QueryResult, Sequence};

use crate::domain::StateError;

/// Capability a replica host needs from the application it replicates.
///
/// The host guarantees that `apply_ordered` and `install_snapshot` run
/// exclusively, one at a time, in delivery order. `apply_unordered` may run
/// concurrently with other unordered calls but never with a mutation.
pub trait ReplicatedStateMachine: Send + Sync {
    /// Apply one command delivered at `sequence`. Must be deterministic.
    fn apply_ordered(&mut self, sequence: Sequence, command: &Command) -> CommandResult;

    /// Answer a read-only query against the current state.
    fn apply_unordered(&self, query: &Query) -> QueryResult;

    /// Serialize the full state.
    fn export_snapshot(&self) -> Result<Vec<u8>, StateError>;

    /// Atomically replace the full state.
    fn install_snapshot(&mut self, bytes: &[u8]) -> Result<(), StateError>;

    /// Sequence of the last applied command (0 before any).
    fn last_applied(&self) -> Sequence;

    /// Digest of the exported state, for cross-replica divergence checks.
    fn state_digest(&self) -> Result<Hash, StateError> {
        Ok(shared_crypto::sha256(&self.export_snapshot()?))
    }
}
