//! # Replica Host
//!
//! One task per replica owns the ordered path: deliveries, snapshot install
//! and mode changes all arrive through a single input queue and are handled
//! one at a time. The state machine sits behind an `RwLock`; the replica task
//! is its only writer, unordered reads take the shared side.

use std::collections::BTreeMap;
use std::sync::Arc;

use lg_01_state_machine::{ReplicatedStateMachine, SnapshotBody, SnapshotStore};
use parking_lot::RwLock;
use shared_types::{
    encode, Command, CommitEvent, CommitRecord, Query, QueryResult, Sequence,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{ReplicaId, ReplicaMode, ReplicaReply, ReplicationError};

/// State machine shared between the replica task and readers.
pub type SharedMachine = Arc<RwLock<Box<dyn ReplicatedStateMachine>>>;

type Done = oneshot::Sender<Result<Sequence, ReplicationError>>;

pub(crate) enum ReplicaInput {
    Deliver {
        sequence: Sequence,
        command: Arc<Command>,
        reply_to: mpsc::UnboundedSender<ReplicaReply>,
    },
    BeginRecovery,
    TransferSnapshot {
        to: mpsc::UnboundedSender<ReplicaInput>,
        done: Done,
    },
    InstallSnapshot {
        bytes: Vec<u8>,
        done: Done,
    },
    SetMode(ReplicaMode),
    Subscribe(mpsc::UnboundedSender<CommitEvent>),
}

/// Cloneable view of a running replica.
#[derive(Clone)]
pub struct ReplicaHandle {
    id: ReplicaId,
    pub(crate) inputs: mpsc::UnboundedSender<ReplicaInput>,
    machine: SharedMachine,
    mode: Arc<RwLock<ReplicaMode>>,
}

impl ReplicaHandle {
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn mode(&self) -> ReplicaMode {
        *self.mode.read()
    }

    /// Serve a read-only query from a consistent view of the state.
    pub fn query(&self, query: &Query) -> QueryResult {
        self.machine.read().apply_unordered(query)
    }

    pub fn last_applied(&self) -> Sequence {
        self.machine.read().last_applied()
    }

    pub fn state_digest(&self) -> Result<[u8; 32], ReplicationError> {
        self.machine
            .read()
            .state_digest()
            .map_err(|e| ReplicationError::StateTransfer(e.to_string()))
    }

    /// Export a snapshot of the current state with its sequence.
    pub fn export_snapshot(&self) -> Result<(Sequence, Vec<u8>), ReplicationError> {
        let machine = self.machine.read();
        machine
            .export_snapshot()
            .map(|bytes| (machine.last_applied(), bytes))
            .map_err(|e| ReplicationError::StateTransfer(e.to_string()))
    }
}

/// Snapshot persistence for the local replica.
#[derive(Clone)]
pub(crate) struct SnapshotPolicy {
    pub store: Arc<dyn SnapshotStore>,
    pub interval: u64,
}

pub(crate) struct Replica {
    id: ReplicaId,
    is_local: bool,
    machine: SharedMachine,
    mode: ReplicaMode,
    mode_view: Arc<RwLock<ReplicaMode>>,
    inputs: mpsc::UnboundedReceiver<ReplicaInput>,
    /// Deliveries held while waiting for a snapshot.
    buffer: BTreeMap<Sequence, (Arc<Command>, mpsc::UnboundedSender<ReplicaReply>)>,
    commits: Option<mpsc::UnboundedSender<CommitEvent>>,
    snapshots: Option<SnapshotPolicy>,
}

impl Replica {
    pub fn spawn(
        id: ReplicaId,
        is_local: bool,
        machine: Box<dyn ReplicatedStateMachine>,
        snapshots: Option<SnapshotPolicy>,
        shutdown: watch::Receiver<bool>,
    ) -> ReplicaHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine: SharedMachine = Arc::new(RwLock::new(machine));
        let mode_view = Arc::new(RwLock::new(ReplicaMode::Active));

        let replica = Replica {
            id,
            is_local,
            machine: Arc::clone(&machine),
            mode: ReplicaMode::Active,
            mode_view: Arc::clone(&mode_view),
            inputs: rx,
            buffer: BTreeMap::new(),
            commits: None,
            snapshots,
        };
        tokio::spawn(replica.run(shutdown));

        ReplicaHandle {
            id,
            inputs: tx,
            machine,
            mode: mode_view,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(replica = self.id, "Replica started");
        loop {
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!(replica = self.id, "Replica stopped");
    }

    fn set_mode(&mut self, mode: ReplicaMode) {
        if self.mode != mode {
            info!(replica = self.id, from = ?self.mode, to = ?mode, "Replica mode changed");
        }
        self.mode = mode;
        *self.mode_view.write() = mode;
    }

    fn handle(&mut self, input: ReplicaInput) {
        match input {
            ReplicaInput::Deliver {
                sequence,
                command,
                reply_to,
            } => match self.mode {
                ReplicaMode::Offline => {
                    trace!(replica = self.id, sequence, "Dropped delivery while offline");
                }
                ReplicaMode::Recovering => {
                    self.buffer.insert(sequence, (command, reply_to));
                }
                ReplicaMode::Active | ReplicaMode::Equivocating => {
                    self.apply_delivery(sequence, &command, &reply_to);
                }
            },
            ReplicaInput::BeginRecovery => {
                self.buffer.clear();
                self.set_mode(ReplicaMode::Recovering);
            }
            ReplicaInput::TransferSnapshot { to, done } => self.transfer_snapshot(to, done),
            ReplicaInput::InstallSnapshot { bytes, done } => self.install_snapshot(&bytes, done),
            ReplicaInput::SetMode(mode) => self.set_mode(mode),
            ReplicaInput::Subscribe(tx) => self.commits = Some(tx),
        }
    }

    fn apply_delivery(
        &mut self,
        sequence: Sequence,
        command: &Command,
        reply_to: &mpsc::UnboundedSender<ReplicaReply>,
    ) {
        let last = self.machine.read().last_applied();
        if sequence <= last {
            debug!(replica = self.id, sequence, last, "Skipping already applied delivery");
            return;
        }
        if sequence != last + 1 {
            warn!(
                replica = self.id,
                sequence,
                expected = last + 1,
                "Gap in delivered sequence, replica needs state transfer"
            );
            self.set_mode(ReplicaMode::Offline);
            return;
        }

        let result = self.machine.write().apply_ordered(sequence, command);

        if self.is_local {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(rejection) => rejection.label(),
            };
            ledger_telemetry::record_command_applied(command.kind(), outcome);
        }

        let payload = match encode(&result) {
            Ok(payload) => payload,
            Err(e) => {
                error!(replica = self.id, sequence, error = %e, "Failed to encode result");
                self.set_mode(ReplicaMode::Offline);
                return;
            }
        };
        let payload = if self.mode == ReplicaMode::Equivocating {
            payload.iter().map(|b| !b).collect()
        } else {
            payload
        };

        // The submitter may have timed out already.
        let _ = reply_to.send(ReplicaReply {
            replica: self.id,
            sequence,
            payload,
        });

        self.publish(CommitEvent::Committed(CommitRecord {
            sequence,
            command: command.clone(),
            result,
        }));
        self.maybe_snapshot(sequence);
    }

    fn publish(&mut self, event: CommitEvent) {
        if let Some(tx) = &self.commits {
            if tx.send(event).is_err() {
                warn!(replica = self.id, "Commit subscriber gone");
                self.commits = None;
            }
        }
    }

    fn maybe_snapshot(&self, sequence: Sequence) {
        let Some(policy) = &self.snapshots else { return };
        if policy.interval == 0 || sequence % policy.interval != 0 {
            return;
        }
        let bytes = match self.machine.read().export_snapshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(replica = self.id, sequence, error = %e, "Snapshot export failed");
                return;
            }
        };
        let store = Arc::clone(&policy.store);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save(sequence, &bytes) {
                error!(sequence, error = %e, "Snapshot persistence failed");
            }
        });
    }

    fn transfer_snapshot(&self, to: mpsc::UnboundedSender<ReplicaInput>, done: Done) {
        // A failed transfer leaves the target offline rather than buffering forever.
        let abort = |done: Done, reason: String| {
            let _ = to.send(ReplicaInput::SetMode(ReplicaMode::Offline));
            let _ = done.send(Err(ReplicationError::StateTransfer(reason)));
        };

        if self.mode != ReplicaMode::Active {
            abort(done, format!("source replica {} is {:?}", self.id, self.mode));
            return;
        }
        let exported = {
            let machine = self.machine.read();
            machine
                .export_snapshot()
                .map(|bytes| (machine.last_applied(), bytes))
        };
        match exported {
            Ok((sequence, bytes)) => {
                debug!(replica = self.id, sequence, size = bytes.len(), "Snapshot exported");
                if let Err(mpsc::error::SendError(ReplicaInput::InstallSnapshot { done, .. })) =
                    to.send(ReplicaInput::InstallSnapshot { bytes, done })
                {
                    let _ = done.send(Err(ReplicationError::StateTransfer(
                        "target replica stopped".into(),
                    )));
                }
            }
            Err(e) => abort(done, e.to_string()),
        }
    }

    fn install_snapshot(&mut self, bytes: &[u8], done: Done) {
        let installed = {
            let mut machine = self.machine.write();
            machine
                .install_snapshot(bytes)
                .map(|_| machine.last_applied())
        };

        let sequence = match installed {
            Ok(sequence) => sequence,
            Err(e) => {
                error!(replica = self.id, error = %e, "Snapshot install failed");
                self.set_mode(ReplicaMode::Offline);
                let _ = done.send(Err(ReplicationError::StateTransfer(e.to_string())));
                return;
            }
        };
        info!(replica = self.id, sequence, "Snapshot installed");
        self.set_mode(ReplicaMode::Active);

        if self.commits.is_some() {
            match SnapshotBody::decode(bytes) {
                Ok(body) => self.publish(CommitEvent::Rebased {
                    sequence,
                    contracts: body.contracts,
                }),
                Err(e) => error!(replica = self.id, error = %e, "Cannot publish rebase"),
            }
        }

        let buffered = std::mem::take(&mut self.buffer);
        for (seq, (command, reply_to)) in buffered {
            if self.mode != ReplicaMode::Active {
                break;
            }
            self.apply_delivery(seq, &command, &reply_to);
        }

        let _ = done.send(Ok(sequence));
    }
}
