//! # Snapshot Format
//!
//! ```text
//! [version:u8][bincode(SnapshotBody)][sha256(version ‖ body):32]
//! ```
//!
//! Contracts are serialized in id order, so two replicas with the same state
//! produce byte-identical snapshots.

use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use shared_types::{ContractId, ContractRecord, Sequence};

use super::StateError;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

const CHECKSUM_LEN: usize = 32;

/// Decoded snapshot contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBody {
    /// Last committed sequence captured by the snapshot.
    pub sequence: Sequence,
    /// All contracts, ascending by id.
    pub contracts: Vec<(ContractId, ContractRecord)>,
}

impl SnapshotBody {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        let body =
            bincode::serialize(self).map_err(|e| StateError::SerializationError(e.to_string()))?;
        let mut out = Vec::with_capacity(1 + body.len() + CHECKSUM_LEN);
        out.push(SNAPSHOT_VERSION);
        out.extend_from_slice(&body);
        let checksum = sha256(&out);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Decode and verify a snapshot. Ids must be strictly ascending and
    /// balances non-negative.
    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() < 1 + CHECKSUM_LEN {
            return Err(StateError::SnapshotTruncated { len: bytes.len() });
        }
        let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if sha256(payload).as_slice() != checksum {
            return Err(StateError::SnapshotChecksumMismatch);
        }
        if payload[0] != SNAPSHOT_VERSION {
            return Err(StateError::SnapshotVersion {
                received: payload[0],
                supported: SNAPSHOT_VERSION,
            });
        }

        let body: SnapshotBody = bincode::deserialize(&payload[1..])
            .map_err(|e| StateError::SerializationError(e.to_string()))?;

        for pair in body.contracts.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(StateError::SnapshotInvalid(format!(
                    "contract {} out of order",
                    pair[1].0
                )));
            }
        }
        if let Some((id, _)) = body.contracts.iter().find(|(_, r)| r.balance < 0) {
            return Err(StateError::SnapshotInvalid(format!(
                "negative balance for {id}"
            )));
        }
        Ok(body)
    }
}
