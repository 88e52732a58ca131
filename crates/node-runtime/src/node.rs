//! # Node Wiring
//!
//! ## Startup Sequence
//!
//! 1. Restore the newest snapshot (if any) into every replica
//! 2. Start the in-process cluster with periodic snapshots on the local
//!    replica
//! 3. Open the read store and seed it from the restored snapshot; a
//!    durable store that ran past the snapshot is rewound to it
//! 4. Start the reconciler on the local replica's commit feed
//! 5. Build the service facade with the node's signing key
//!
//! ## Shutdown Sequence
//!
//! 1. Signal listeners to stop accepting requests
//! 2. Stop ordering
//! 3. Persist a final snapshot of the local replica

use std::sync::Arc;

use anyhow::{Context, Result};
use lg_01_state_machine::{
    FileSnapshotStore, LedgerStateMachine, ReplicatedStateMachine, SnapshotBody, SnapshotStore,
    StateError,
};
use lg_02_envelope::{EnvelopeVerifier, ResponseSigner};
use lg_03_replication::InProcessCluster;
use lg_04_read_store::{InMemoryReadStore, ReadStore, Reconciler};
use lg_05_ledger_service::{LedgerApi, LedgerService};
use shared_crypto::Secp256k1KeyPair;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{NodeConfig, StoreBackend};

pub struct NodeRuntime {
    config: NodeConfig,
    cluster: Arc<InProcessCluster>,
    reconciler: Arc<Reconciler>,
    service: Arc<LedgerService>,
    snapshots: Arc<FileSnapshotStore>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Build and start every component. Must run inside a Tokio runtime.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        info!(
            replica = config.node.replica_id,
            cluster_size = config.node.cluster_size,
            policy = %config.security.policy,
            "Starting ledger node"
        );

        let snapshots = Arc::new(
            FileSnapshotStore::new(config.snapshot_dir(), config.replication.snapshot_retain)
                .context("Failed to open snapshot directory")?,
        );
        let restored = snapshots
            .load_latest()
            .context("Failed to read latest snapshot")?;
        let body = match &restored {
            Some((sequence, bytes)) => {
                info!(sequence, "Restoring from snapshot");
                Some(SnapshotBody::decode(bytes).context("Latest snapshot is unusable")?)
            }
            None => {
                info!("No snapshot found, starting from an empty ledger");
                None
            }
        };

        let machines = (0..config.node.cluster_size)
            .map(|_| -> Result<Box<dyn ReplicatedStateMachine>, StateError> {
                let machine = match &restored {
                    Some((_, bytes)) => LedgerStateMachine::from_snapshot(bytes)?,
                    None => LedgerStateMachine::new(),
                };
                Ok(Box::new(machine) as Box<dyn ReplicatedStateMachine>)
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to build replicas")?;

        let cluster = Arc::new(
            InProcessCluster::start(
                config.cluster(),
                machines,
                Some(Arc::clone(&snapshots) as Arc<dyn SnapshotStore>),
            )
            .context("Failed to start cluster")?,
        );
        let feed = cluster.subscribe_commits(config.node.replica_id)?;

        let store = open_store(&config)?;
        seed_store(store.as_ref(), body.as_ref()).context("Failed to seed read store")?;

        let reconciler = Arc::new(Reconciler::spawn(
            Arc::clone(&store),
            feed,
            config.reconciler(),
        )?);

        let policy = config.policy()?;
        let service = LedgerService::new(
            cluster.clone(),
            store,
            EnvelopeVerifier::new(policy, config.nonce_retention()),
            ResponseSigner::new(service_keypair(&config)?, policy),
            config.service(),
        )
        .with_reconciler(Arc::clone(&reconciler));

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            cluster,
            reconciler,
            service: Arc::new(service),
            snapshots,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn cluster(&self) -> &Arc<InProcessCluster> {
        &self.cluster
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn service(&self) -> &Arc<LedgerService> {
        &self.service
    }

    pub fn api(&self) -> Arc<dyn LedgerApi> {
        self.service.clone()
    }

    /// Flips to `true` when the node starts shutting down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);
        self.cluster.shutdown();

        let (sequence, bytes) = self.cluster.local().export_snapshot()?;
        if sequence == 0 {
            info!("Nothing committed, no final snapshot");
            return Ok(());
        }
        let snapshots = Arc::clone(&self.snapshots);
        tokio::task::spawn_blocking(move || snapshots.save(sequence, &bytes))
            .await
            .context("Snapshot task failed")?
            .context("Failed to write final snapshot")?;
        info!(sequence, "Final snapshot written");
        Ok(())
    }
}

fn open_store(config: &NodeConfig) -> Result<Arc<dyn ReadStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryReadStore::new())),
        #[cfg(feature = "rocksdb")]
        StoreBackend::Rocksdb => {
            let path = config.store_path();
            let store = lg_04_read_store::RocksDbReadStore::open(
                &path,
                lg_04_read_store::RocksDbStoreConfig::default(),
            )
            .with_context(|| format!("Failed to open read store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::Rocksdb => anyhow::bail!("built without the `rocksdb` feature"),
    }
}

/// Align the read store with the restored state. Commits the store saw
/// after the snapshot were lost with the crashed replicas, so their
/// projection is rolled back rather than kept.
fn seed_store(store: &dyn ReadStore, body: Option<&SnapshotBody>) -> Result<()> {
    let store_applied = store.applied_sequence()?;
    let (sequence, contracts) = body.map_or((0, &[][..]), |b| (b.sequence, &b.contracts[..]));
    if store_applied > sequence {
        warn!(
            store_applied,
            snapshot = sequence,
            "Read store is ahead of the snapshot; rewinding it"
        );
        store.rewind(sequence, contracts)?;
    } else if sequence > 0 {
        store.rebase(sequence, contracts)?;
    }
    Ok(())
}

fn service_keypair(config: &NodeConfig) -> Result<Secp256k1KeyPair> {
    match &config.security.service_key_hex {
        Some(text) => {
            let bytes = hex::decode(text.trim()).context("service_key_hex is not hex")?;
            Secp256k1KeyPair::from_slice(&bytes).context("service_key_hex is not a valid key")
        }
        None => {
            let keypair = Secp256k1KeyPair::generate();
            warn!(
                public_key = %hex::encode(keypair.public_key().as_bytes()),
                "No service key configured; generated one for this run only"
            );
            Ok(keypair)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lg_02_envelope::LedgerClient;
    use shared_types::ContractId;

    fn config(dir: &std::path::Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.cluster_size = 4;
        config.node.data_dir = dir.to_path_buf();
        config.replication.reply_quorum = Some(2);
        config.store.await_reconciliation = true;
        config.security.service_key_hex = Some(hex::encode([7u8; 32]));
        config
    }

    #[tokio::test]
    async fn test_restart_restores_ledger_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let owner = LedgerClient::generate(ContractId::from_bytes(b"c1").unwrap(), false);

        let node = NodeRuntime::start(config(dir.path())).await.unwrap();
        let service = node.service();
        service.create_contract(owner.create_contract()).await.unwrap();
        service.load_money(owner.load_money(250)).await.unwrap();
        let key = service.service_public_key();
        node.shutdown().await.unwrap();
        drop(node);

        let node = NodeRuntime::start(config(dir.path())).await.unwrap();
        let service = node.service();
        assert_eq!(service.service_public_key(), key);
        assert_eq!(node.cluster().local().last_applied(), 2);

        let balance = service.get_balance(owner.balance()).await.unwrap();
        assert_eq!(balance.body.balance, 250);
        let ledger = service.get_ledger(owner.contract_query()).await.unwrap();
        assert_eq!(ledger.body.rows.len(), 1);

        // New commits continue after the restored sequence.
        service.load_money(owner.load_money(5)).await.unwrap();
        assert_eq!(node.cluster().local().last_applied(), 3);
        node.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_signal_fires() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeRuntime::start(config(dir.path())).await.unwrap();
        let signal = node.shutdown_signal();
        assert!(!*signal.borrow());

        node.shutdown().await.unwrap();
        assert!(*signal.borrow());
    }

    #[test]
    fn test_store_ahead_of_snapshot_is_rewound() {
        let store = InMemoryReadStore::new();
        let ahead = ContractId::from_bytes(b"late").unwrap();
        store.insert_contract(&ahead, &[2; 33], None).unwrap();
        store
            .apply_projection(&lg_04_read_store::Projection {
                sequence: 9,
                writes: vec![],
            })
            .unwrap();

        let kept = ContractId::from_bytes(b"c1").unwrap();
        let mut record = shared_types::ContractRecord::new(vec![3; 33], None);
        record.balance = 40;
        let body = SnapshotBody {
            sequence: 4,
            contracts: vec![(kept.clone(), record)],
        };
        seed_store(&store, Some(&body)).unwrap();

        assert_eq!(store.applied_sequence().unwrap(), 4);
        assert_eq!(store.get_contract(&ahead).unwrap(), None);
        assert_eq!(store.get_contract(&kept).unwrap().unwrap().balance, 40);

        // Without any snapshot the store is emptied back to zero.
        seed_store(&store, None).unwrap();
        assert_eq!(store.applied_sequence().unwrap(), 0);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_service_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.security.service_key_hex = Some("zz".into());
        assert!(NodeRuntime::start(config).await.is_err());
    }
}
