use std::time::Duration;

use shared_types::Sequence;

use super::ReplicationError;

/// Index of a replica within the cluster.
pub type ReplicaId = usize;

/// Agreed result of an ordered submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedReply {
    /// Position assigned by the total order.
    pub sequence: Sequence,
    /// Encoded `CommandResult`.
    pub payload: Vec<u8>,
}

/// One replica's answer to a delivered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaReply {
    pub replica: ReplicaId,
    pub sequence: Sequence,
    pub payload: Vec<u8>,
}

/// Operating mode of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaMode {
    /// Applies deliveries in order.
    Active,
    /// Crashed or stale: drops deliveries until recovered.
    Offline,
    /// Waiting for a snapshot; deliveries are buffered.
    Recovering,
    /// Faulty: applies but answers with corrupted payloads.
    Equivocating,
}

/// Shape and timing of an in-process cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Number of replicas (n = 3f + 1 tolerates f faults).
    pub size: usize,
    /// Replica owned by this node: serves unordered reads and feeds the
    /// local reconciler.
    pub local: ReplicaId,
    /// Matching replies required before an ordered submission completes.
    pub reply_quorum: usize,
    /// Bound on waiting for the quorum.
    pub submit_timeout: Duration,
    /// Commits between snapshot files of the local replica (0 = never).
    pub snapshot_interval: u64,
    /// Capacity of the sequencer's submission queue.
    pub submission_capacity: usize,
}

impl ClusterConfig {
    /// Faults tolerated by `size` replicas.
    pub fn max_faulty(size: usize) -> usize {
        size.saturating_sub(1) / 3
    }

    /// `f + 1` matching replies: at least one correct replica agrees.
    pub fn default_quorum(size: usize) -> usize {
        Self::max_faulty(size) + 1
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            reply_quorum: Self::default_quorum(size),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ReplicationError> {
        if self.size == 0 {
            return Err(ReplicationError::InvalidConfig("cluster size must be >= 1".into()));
        }
        if self.local >= self.size {
            return Err(ReplicationError::InvalidConfig(format!(
                "local replica {} outside cluster of {}",
                self.local, self.size
            )));
        }
        if self.reply_quorum == 0 || self.reply_quorum > self.size {
            return Err(ReplicationError::InvalidConfig(format!(
                "reply quorum {} must be within 1..={}",
                self.reply_quorum, self.size
            )));
        }
        if self.submit_timeout.is_zero() {
            return Err(ReplicationError::InvalidConfig("submit timeout must be > 0".into()));
        }
        if self.submission_capacity == 0 {
            return Err(ReplicationError::InvalidConfig(
                "submission capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            size: 4,
            local: 0,
            reply_quorum: 2,
            submit_timeout: Duration::from_secs(5),
            snapshot_interval: 0,
            submission_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_sizes() {
        assert_eq!(ClusterConfig::default_quorum(1), 1);
        assert_eq!(ClusterConfig::default_quorum(4), 2);
        assert_eq!(ClusterConfig::default_quorum(7), 3);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(ClusterConfig::with_size(4).validate().is_ok());
        assert!(ClusterConfig::with_size(0).validate().is_err());

        let mut config = ClusterConfig::with_size(4);
        config.reply_quorum = 5;
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::with_size(4);
        config.local = 4;
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::with_size(4);
        config.submit_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
