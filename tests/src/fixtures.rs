//! Shared fixtures: an in-process ledger wired the way a node wires it.

use std::sync::Arc;
use std::time::Duration;

use lg_01_state_machine::{LedgerStateMachine, ReplicatedStateMachine};
use lg_02_envelope::{
    EnvelopeVerifier, LedgerClient, NonceRetention, ResponseSigner, VerificationPolicy,
};
use lg_03_replication::{ClusterConfig, InProcessCluster, ReplicaMode};
use lg_04_read_store::{InMemoryReadStore, Reconciler, ReconcilerConfig};
use lg_05_ledger_service::{LedgerApi, LedgerService, ServiceConfig};
use shared_crypto::Secp256k1KeyPair;
use shared_types::ContractId;

pub struct TestLedger {
    pub cluster: Arc<InProcessCluster>,
    pub store: Arc<InMemoryReadStore>,
    pub reconciler: Arc<Reconciler>,
    pub service: Arc<LedgerService>,
}

impl TestLedger {
    /// `size` replicas, local replica 0, f + 1 reply quorum. Must be called
    /// inside a Tokio runtime.
    pub fn start(size: usize, policy: VerificationPolicy) -> Self {
        Self::start_with(
            ClusterConfig {
                submit_timeout: Duration::from_millis(500),
                ..ClusterConfig::with_size(size)
            },
            policy,
        )
    }

    pub fn start_with(config: ClusterConfig, policy: VerificationPolicy) -> Self {
        let machines = (0..config.size)
            .map(|_| Box::new(LedgerStateMachine::new()) as Box<dyn ReplicatedStateMachine>)
            .collect();
        let local = config.local;
        let cluster = Arc::new(
            InProcessCluster::start(config, machines, None).expect("cluster config is valid"),
        );
        let feed = cluster
            .subscribe_commits(local)
            .expect("local replica exists");

        let store = Arc::new(InMemoryReadStore::new());
        let reconciler = Arc::new(
            Reconciler::spawn(store.clone(), feed, ReconcilerConfig::default())
                .expect("memory store is readable"),
        );
        let service = LedgerService::new(
            cluster.clone(),
            store.clone(),
            EnvelopeVerifier::new(policy, NonceRetention::Unbounded),
            ResponseSigner::new(Secp256k1KeyPair::generate(), policy),
            ServiceConfig {
                await_reconciliation: true,
                ..ServiceConfig::default()
            },
        )
        .with_reconciler(reconciler.clone());

        Self {
            cluster,
            store,
            reconciler,
            service: Arc::new(service),
        }
    }

    /// A contract owner that has pinned this ledger's service key.
    pub fn client(&self, name: &str, with_secret: bool) -> LedgerClient {
        LedgerClient::generate(contract(name), with_secret)
            .with_service_key(self.service.service_public_key().public_key)
    }

    /// Register `owner` and load `amount` into it.
    pub async fn open_account(&self, owner: &LedgerClient, amount: i64) {
        self.service
            .create_contract(owner.create_contract())
            .await
            .expect("contract creation succeeds");
        if amount > 0 {
            self.service
                .load_money(owner.load_money(amount))
                .await
                .expect("load succeeds");
        }
    }

    pub async fn balance(&self, owner: &LedgerClient) -> i64 {
        self.service
            .get_balance(owner.balance())
            .await
            .expect("balance query succeeds")
            .body
            .balance
    }

    /// Wait until every replica not marked offline has applied `sequence`.
    pub async fn settle(&self, sequence: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let behind = self.cluster.replicas().iter().any(|replica| {
                replica.mode() != ReplicaMode::Offline && replica.last_applied() < sequence
            });
            if !behind {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "replicas did not reach sequence {sequence}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// State digests of every replica, in replica order.
    pub fn digests(&self) -> Vec<[u8; 32]> {
        self.cluster
            .replicas()
            .iter()
            .map(|replica| replica.state_digest().expect("digest"))
            .collect()
    }
}

pub fn contract(name: &str) -> ContractId {
    ContractId::from_bytes(name.as_bytes()).expect("non-empty name")
}
