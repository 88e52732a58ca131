//! # Reconciler
//!
//! Single consumer of the local replica's commit feed. Projections are
//! applied strictly in the order the feed delivers them; a failing store is
//! retried with exponential backoff until it recovers, and the replicated
//! state is never touched.
//!
//! ```text
//! [Replica] ──CommitEvent──→ [Reconciler task] ──spawn_blocking──→ ReadStore
//!                                   │
//!                                   └──watch(applied)──→ wait_for(seq)
//! ```

use std::sync::Arc;
use std::time::Duration;

use shared_types::{CommitEvent, Sequence};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{Projection, StoreError};
use crate::ports::ReadStore;

/// Retry pacing for a failing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub retry_initial: Duration,
    pub retry_max: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            retry_initial: Duration::from_millis(50),
            retry_max: Duration::from_secs(5),
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn ReadStore>,
    applied: watch::Receiver<Sequence>,
    task: JoinHandle<()>,
}

impl Reconciler {
    /// Start consuming `feed`. The watermark starts at the store's
    /// `applied_sequence`.
    pub fn spawn(
        store: Arc<dyn ReadStore>,
        feed: mpsc::UnboundedReceiver<CommitEvent>,
        config: ReconcilerConfig,
    ) -> Result<Self, StoreError> {
        let start = store.applied_sequence()?;
        let (tx, applied) = watch::channel(start);
        let task = tokio::spawn(run(Arc::clone(&store), feed, tx, config));
        info!(applied = start, "Reconciler started");
        Ok(Self {
            store,
            applied,
            task,
        })
    }

    pub fn store(&self) -> &Arc<dyn ReadStore> {
        &self.store
    }

    /// Highest sequence projected so far.
    pub fn applied(&self) -> Sequence {
        *self.applied.borrow()
    }

    pub fn watermark(&self) -> watch::Receiver<Sequence> {
        self.applied.clone()
    }

    /// Resolve once `sequence` has been projected.
    pub async fn wait_for(&self, sequence: Sequence) -> Result<(), StoreError> {
        let mut applied = self.applied.clone();
        let reached = applied.wait_for(|applied| *applied >= sequence).await.is_ok();
        if reached {
            Ok(())
        } else {
            Err(StoreError::ReconcilerStopped {
                applied: *applied.borrow(),
            })
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the feed to close and every received event to be projected.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Reconciler task failed");
        }
    }
}

async fn run(
    store: Arc<dyn ReadStore>,
    mut feed: mpsc::UnboundedReceiver<CommitEvent>,
    applied: watch::Sender<Sequence>,
    config: ReconcilerConfig,
) {
    while let Some(event) = feed.recv().await {
        let sequence = event.sequence();
        if sequence <= *applied.borrow() {
            debug!(sequence, "Skipping already projected commit");
            continue;
        }
        let event = Arc::new(event);

        let mut delay = config.retry_initial;
        loop {
            match project(Arc::clone(&store), Arc::clone(&event)).await {
                Ok(written) => {
                    if !written {
                        debug!(sequence, "Store already had this commit");
                    }
                    break;
                }
                Err(e) => {
                    let lag = sequence.saturating_sub(*applied.borrow());
                    warn!(sequence, error = %e, retry_in_ms = delay.as_millis() as u64, "Projection failed");
                    ledger_telemetry::record_reconcile_retry();
                    ledger_telemetry::set_reconcile_lag(lag);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(config.retry_max);
                }
            }
        }

        applied.send_replace(sequence);
        ledger_telemetry::set_reconcile_lag(0);
    }
    info!(applied = *applied.borrow(), "Commit feed closed, reconciler stopped");
}

async fn project(store: Arc<dyn ReadStore>, event: Arc<CommitEvent>) -> Result<bool, StoreError> {
    tokio::task::spawn_blocking(move || match event.as_ref() {
        CommitEvent::Committed(record) => store.apply_projection(&Projection::from_commit(record)),
        CommitEvent::Rebased {
            sequence,
            contracts,
        } => store.rebase(*sequence, contracts),
    })
    .await
    .map_err(|e| StoreError::Backend(format!("projection task: {e}")))?
}
