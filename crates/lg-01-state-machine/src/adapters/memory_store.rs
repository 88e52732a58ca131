use parking_lot::Mutex;
use shared_types::Sequence;

use crate::domain::StateError;
use crate::ports::SnapshotStore;

/// In-memory snapshot store for tests; keeps only the latest snapshot.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    latest: Mutex<Option<(Sequence, Vec<u8>)>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, sequence: Sequence, bytes: &[u8]) -> Result<(), StateError> {
        let mut latest = self.latest.lock();
        if latest.as_ref().map_or(true, |(seq, _)| *seq <= sequence) {
            *latest = Some((sequence, bytes.to_vec()));
        }
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<(Sequence, Vec<u8>)>, StateError> {
        Ok(self.latest.lock().clone())
    }
}
