//! # In-Process Cluster
//!
//! A total-order broadcast hosted in one process. A single sequencer task
//! assigns consecutive sequence numbers and fans every command out to all
//! replicas; submitters collect replies until enough of them match.
//!
//! ```text
//! submit_ordered ──try_send──→ [Sequencer] ──Deliver(seq)──→ replica 0..n
//!       ↑                                                         │
//!       └──────────────── ReplicaReply (per submission) ──────────┘
//! ```
//!
//! ## Completion Rule
//!
//! An ordered submission resolves when `reply_quorum` replies agree on the
//! same (sequence, payload) and the local replica has applied the command.
//! Anything short of that within `submit_timeout` is reported as
//! [`ReplicationError::ExecutionUncertain`]: the command may still commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lg_01_state_machine::{ReplicatedStateMachine, SnapshotStore};
use shared_types::{decode, encode, Command, CommitEvent, Query, Sequence};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::{
    ClusterConfig, OrderedReply, ReplicaId, ReplicaMode, ReplicaReply, ReplicationError,
};
use crate::ports::ReplicationBoundary;
use crate::replica::{Replica, ReplicaHandle, ReplicaInput, SnapshotPolicy};

enum SequencerInput {
    Submit {
        command: Arc<Command>,
        reply_to: mpsc::UnboundedSender<ReplicaReply>,
    },
    Recover {
        target: ReplicaId,
        source: ReplicaId,
        done: oneshot::Sender<Result<Sequence, ReplicationError>>,
    },
}

/// Replicas plus the sequencer that orders their input.
pub struct InProcessCluster {
    config: ClusterConfig,
    replicas: Vec<ReplicaHandle>,
    submissions: mpsc::Sender<SequencerInput>,
    shutdown: watch::Sender<bool>,
}

impl InProcessCluster {
    /// Start one replica per machine and the sequencer.
    ///
    /// Must be called inside a Tokio runtime. Ordering resumes after the
    /// highest `last_applied` among the machines; replicas behind it go
    /// offline on their first delivery and need [`Self::recover_replica`].
    pub fn start(
        config: ClusterConfig,
        machines: Vec<Box<dyn ReplicatedStateMachine>>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
    ) -> Result<Self, ReplicationError> {
        config.validate()?;
        if machines.len() != config.size {
            return Err(ReplicationError::InvalidConfig(format!(
                "{} machines for a cluster of {}",
                machines.len(),
                config.size
            )));
        }

        let start = machines.iter().map(|m| m.last_applied()).max().unwrap_or(0);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let replicas: Vec<ReplicaHandle> = machines
            .into_iter()
            .enumerate()
            .map(|(id, machine)| {
                let is_local = id == config.local;
                let policy = snapshots
                    .as_ref()
                    .filter(|_| is_local && config.snapshot_interval > 0)
                    .map(|store| SnapshotPolicy {
                        store: Arc::clone(store),
                        interval: config.snapshot_interval,
                    });
                Replica::spawn(id, is_local, machine, policy, shutdown_rx.clone())
            })
            .collect();

        let (submissions, queue) = mpsc::channel(config.submission_capacity);
        let fanout: Vec<_> = replicas.iter().map(|r| r.inputs.clone()).collect();
        tokio::spawn(run_sequencer(start, queue, fanout, shutdown_rx));

        info!(
            size = config.size,
            local = config.local,
            quorum = config.reply_quorum,
            start_sequence = start,
            "Cluster started"
        );

        Ok(Self {
            config,
            replicas,
            submissions,
            shutdown,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn replica(&self, id: ReplicaId) -> Option<&ReplicaHandle> {
        self.replicas.get(id)
    }

    pub fn replicas(&self) -> &[ReplicaHandle] {
        &self.replicas
    }

    /// The replica owned by this node.
    pub fn local(&self) -> &ReplicaHandle {
        &self.replicas[self.config.local]
    }

    fn handle(&self, id: ReplicaId) -> Result<&ReplicaHandle, ReplicationError> {
        self.replicas.get(id).ok_or(ReplicationError::ReplicaNotFound(id))
    }

    /// Feed of commits applied by replica `id`, starting with the next one.
    ///
    /// Replaces any previous subscription on that replica.
    pub fn subscribe_commits(
        &self,
        id: ReplicaId,
    ) -> Result<mpsc::UnboundedReceiver<CommitEvent>, ReplicationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.handle(id)?
            .inputs
            .send(ReplicaInput::Subscribe(tx))
            .map_err(|_| ReplicationError::Unavailable(format!("replica {id} stopped")))?;
        Ok(rx)
    }

    /// Switch the mode of replica `id`. Takes effect before any delivery
    /// submitted afterwards.
    pub fn set_mode(&self, id: ReplicaId, mode: ReplicaMode) -> Result<(), ReplicationError> {
        self.handle(id)?
            .inputs
            .send(ReplicaInput::SetMode(mode))
            .map_err(|_| ReplicationError::Unavailable(format!("replica {id} stopped")))
    }

    /// Rebuild `target` from a snapshot of `source`, then replay what was
    /// ordered meanwhile. Returns the installed snapshot's sequence.
    pub async fn recover_replica(
        &self,
        target: ReplicaId,
        source: ReplicaId,
    ) -> Result<Sequence, ReplicationError> {
        self.handle(target)?;
        self.handle(source)?;
        if target == source {
            return Err(ReplicationError::StateTransfer(format!(
                "replica {target} cannot recover from itself"
            )));
        }

        info!(to = target, from = source, "Starting state transfer");
        let (done, result) = oneshot::channel();
        self.submissions
            .send(SequencerInput::Recover {
                target,
                source,
                done,
            })
            .await
            .map_err(|_| ReplicationError::Unavailable("cluster stopped".into()))?;

        let sequence = result
            .await
            .map_err(|_| ReplicationError::StateTransfer("state transfer aborted".into()))??;
        info!(to = target, from = source, sequence, "State transfer complete");
        Ok(sequence)
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Stop the sequencer and all replicas. Idempotent.
    pub fn shutdown(&self) {
        if self.is_running() {
            info!("Cluster shutting down");
            let _ = self.shutdown.send(true);
        }
    }

    async fn await_quorum(
        &self,
        mut replies: mpsc::UnboundedReceiver<ReplicaReply>,
    ) -> Result<OrderedReply, ReplicationError> {
        let started = Instant::now();
        let deadline = started + self.config.submit_timeout;
        let required = self.config.reply_quorum;

        let mut tally: HashMap<(Sequence, Vec<u8>), usize> = HashMap::new();
        let mut local: Option<(Sequence, Vec<u8>)> = None;
        let mut agreed: Option<(Sequence, Vec<u8>)> = None;

        loop {
            if let (Some(agreed), Some(local)) = (&agreed, &local) {
                if agreed != local {
                    error!(
                        sequence = agreed.0,
                        replica = self.config.local,
                        "Local replica diverged from quorum result"
                    );
                }
                return Ok(OrderedReply {
                    sequence: agreed.0,
                    payload: agreed.1.clone(),
                });
            }

            match timeout_at(deadline, replies.recv()).await {
                Ok(Some(reply)) => {
                    let key = (reply.sequence, reply.payload);
                    if reply.replica == self.config.local {
                        local = Some(key.clone());
                    }
                    let count = tally.entry(key.clone()).or_insert(0);
                    *count += 1;
                    if *count >= required && agreed.is_none() {
                        agreed = Some(key);
                    }
                }
                // Timed out, or every replica has answered or dropped the delivery.
                Ok(None) | Err(_) => {
                    let best = tally.values().copied().max().unwrap_or(0);
                    let waited_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        best,
                        required,
                        waited_ms,
                        local_applied = local.is_some(),
                        "Ordered submission did not complete"
                    );
                    ledger_telemetry::record_replication_timeout();
                    return Err(ReplicationError::ExecutionUncertain {
                        waited_ms,
                        best,
                        required,
                    });
                }
            }
        }
    }
}

impl Drop for InProcessCluster {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[async_trait]
impl ReplicationBoundary for InProcessCluster {
    async fn submit_ordered(&self, command: Vec<u8>) -> Result<OrderedReply, ReplicationError> {
        if !self.is_running() {
            return Err(ReplicationError::Unavailable("cluster stopped".into()));
        }
        let command: Command = decode(&command)?;

        let (reply_to, replies) = mpsc::unbounded_channel();
        self.submissions
            .try_send(SequencerInput::Submit {
                command: Arc::new(command),
                reply_to,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    ReplicationError::Unavailable("submission queue full".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    ReplicationError::Unavailable("cluster stopped".into())
                }
            })?;

        self.await_quorum(replies).await
    }

    async fn submit_unordered(&self, query: Vec<u8>) -> Result<Vec<u8>, ReplicationError> {
        if !self.is_running() {
            return Err(ReplicationError::Unavailable("cluster stopped".into()));
        }
        let query: Query = decode(&query)?;

        let local = self.local();
        match local.mode() {
            ReplicaMode::Offline | ReplicaMode::Recovering => Err(ReplicationError::Unavailable(
                format!("local replica {} is {:?}", local.id(), local.mode()),
            )),
            ReplicaMode::Active | ReplicaMode::Equivocating => Ok(encode(&local.query(&query))?),
        }
    }
}

async fn run_sequencer(
    start: Sequence,
    mut queue: mpsc::Receiver<SequencerInput>,
    replicas: Vec<mpsc::UnboundedSender<ReplicaInput>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next = start + 1;
    loop {
        let input = tokio::select! {
            input = queue.recv() => match input {
                Some(input) => input,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        match input {
            SequencerInput::Submit { command, reply_to } => {
                debug!(sequence = next, kind = command.kind(), "Ordering command");
                for replica in &replicas {
                    // A stopped replica simply never replies.
                    let _ = replica.send(ReplicaInput::Deliver {
                        sequence: next,
                        command: Arc::clone(&command),
                        reply_to: reply_to.clone(),
                    });
                }
                next += 1;
            }
            SequencerInput::Recover {
                target,
                source,
                done,
            } => {
                let (Some(target_tx), Some(source_tx)) = (replicas.get(target), replicas.get(source))
                else {
                    let _ = done.send(Err(ReplicationError::ReplicaNotFound(target.max(source))));
                    continue;
                };
                let _ = target_tx.send(ReplicaInput::BeginRecovery);
                if let Err(mpsc::error::SendError(ReplicaInput::TransferSnapshot { done, .. })) =
                    source_tx.send(ReplicaInput::TransferSnapshot {
                        to: target_tx.clone(),
                        done,
                    })
                {
                    let _ = done.send(Err(ReplicationError::StateTransfer(format!(
                        "source replica {source} stopped"
                    ))));
                }
            }
        }
    }
    debug!(last_sequence = next - 1, "Sequencer stopped");
}
