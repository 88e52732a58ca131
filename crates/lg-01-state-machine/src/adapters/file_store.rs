//! File-backed snapshot store.
//!
//! Each snapshot is written to a temporary file and renamed into place, so a
//! crash mid-write never leaves a torn `snapshot-*.bin`.

use std::fs;
use std::path::{Path, PathBuf};

use shared_types::Sequence;
use tracing::{debug, warn};

use crate::domain::StateError;
use crate::ports::SnapshotStore;

const PREFIX: &str = "snapshot-";
const SUFFIX: &str = ".bin";

/// Snapshot files in a directory, newest `retain` kept.
pub struct FileSnapshotStore {
    dir: PathBuf,
    retain: usize,
}

impl FileSnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P, retain: usize) -> Result<Self, StateError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            retain: retain.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, sequence: Sequence) -> PathBuf {
        self.dir.join(format!("{PREFIX}{sequence:020}{SUFFIX}"))
    }

    /// Sequences of all snapshot files, ascending.
    fn list(&self) -> Result<Vec<Sequence>, StateError> {
        let mut sequences = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(seq) = name
                .strip_prefix(PREFIX)
                .and_then(|rest| rest.strip_suffix(SUFFIX))
                .and_then(|digits| digits.parse::<Sequence>().ok())
            {
                sequences.push(seq);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    fn prune(&self) -> Result<(), StateError> {
        let sequences = self.list()?;
        if sequences.len() <= self.retain {
            return Ok(());
        }
        for seq in &sequences[..sequences.len() - self.retain] {
            if let Err(e) = fs::remove_file(self.path_for(*seq)) {
                warn!(sequence = seq, error = %e, "Failed to prune snapshot");
            }
        }
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, sequence: Sequence, bytes: &[u8]) -> Result<(), StateError> {
        let path = self.path_for(sequence);
        let tmp_path = path.with_extension("bin.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;
        debug!(sequence, size = bytes.len(), "Snapshot persisted");
        self.prune()
    }

    fn load_latest(&self) -> Result<Option<(Sequence, Vec<u8>)>, StateError> {
        match self.list()?.last() {
            Some(&seq) => Ok(Some((seq, fs::read(self.path_for(seq))?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_has_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path(), 2).unwrap();
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_latest_wins_and_old_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path(), 2).unwrap();

        store.save(5, b"five").unwrap();
        store.save(12, b"twelve").unwrap();
        store.save(9, b"nine").unwrap();

        assert_eq!(store.load_latest().unwrap(), Some((12, b"twelve".to_vec())));
        assert_eq!(store.list().unwrap(), vec![9, 12]);
    }

    #[test]
    fn test_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("snapshot-abc.bin"), b"x").unwrap();
        let store = FileSnapshotStore::new(dir.path(), 1).unwrap();

        store.save(3, b"three").unwrap();
        assert_eq!(store.load_latest().unwrap(), Some((3, b"three".to_vec())));
    }
}
