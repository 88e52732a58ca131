//! # Recovery
//!
//! Lagging replicas are rebuilt by state transfer; a restarted node resumes
//! from its newest snapshot.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lg_01_state_machine::{FileSnapshotStore, SnapshotStore};
    use lg_02_envelope::{LedgerClient, VerificationPolicy};
    use lg_03_replication::{ReplicaMode, ReplicationBoundary, ReplicationError};
    use lg_04_read_store::ReadStore;
    use lg_05_ledger_service::LedgerApi;
    use node_runtime::{NodeConfig, NodeRuntime};
    use shared_types::{encode, Command};

    use crate::fixtures::{contract, TestLedger};

    #[tokio::test]
    async fn test_lagging_replica_rejoins_with_equal_state() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let c1 = ledger.client("c1", false);
        let c2 = ledger.client("c2", false);

        ledger.cluster.set_mode(3, ReplicaMode::Offline).unwrap();
        ledger.open_account(&c1, 500).await;
        ledger.open_account(&c2, 0).await;
        ledger
            .service
            .send_transaction(c1.send_transaction(c2.contract(), 120))
            .await
            .unwrap();
        assert_eq!(ledger.cluster.replica(3).unwrap().last_applied(), 0);

        let installed = ledger.cluster.recover_replica(3, 1).await.unwrap();
        assert!(installed >= 3);

        ledger
            .service
            .load_money(c2.load_money(1))
            .await
            .unwrap();
        let last = ledger.cluster.local().last_applied();
        ledger.settle(last).await;
        assert_eq!(ledger.cluster.replica(3).unwrap().mode(), ReplicaMode::Active);
        assert!(ledger.digests().windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_local_replica_recovery_rebases_read_store() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let c1 = ledger.client("c1", false);
        ledger.open_account(&c1, 100).await;

        // Ordered while the local replica is away: the caller cannot be told
        // the outcome, but the other replicas apply it.
        ledger.cluster.set_mode(0, ReplicaMode::Offline).unwrap();
        let missed = encode(&Command::LoadMoney {
            id: c1.contract().clone(),
            amount: 40,
        })
        .unwrap();
        assert!(matches!(
            ledger.cluster.submit_ordered(missed).await,
            Err(ReplicationError::ExecutionUncertain { .. })
        ));

        let installed = ledger.cluster.recover_replica(0, 1).await.unwrap();
        assert_eq!(installed, 3);
        tokio::time::timeout(Duration::from_secs(2), ledger.reconciler.wait_for(installed))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ledger.balance(&c1).await, 140);
        assert_eq!(
            ledger.store.get_contract(c1.contract()).unwrap().unwrap().balance,
            140
        );
        let listing = ledger.service.get_ledger(c1.contract_query()).await.unwrap();
        assert!(listing.body.rows[0].contains(":140:"));
    }

    fn node_config(dir: &std::path::Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.cluster_size = 4;
        config.node.data_dir = dir.to_path_buf();
        config.replication.snapshot_interval = 2;
        config.store.await_reconciliation = true;
        config.security.service_key_hex = Some("11".repeat(32));
        config
    }

    #[tokio::test]
    async fn test_crash_restarts_from_periodic_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let owner = LedgerClient::generate(contract("c1"), false);

        let node = NodeRuntime::start(node_config(dir.path())).await.unwrap();
        let service = node.service().clone();
        service.create_contract(owner.create_contract()).await.unwrap();
        for _ in 0..4 {
            service.load_money(owner.load_money(10)).await.unwrap();
        }

        // Snapshots land at sequences 2 and 4; wait for the second file.
        let files = FileSnapshotStore::new(node.config().snapshot_dir(), 3).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while files.load_latest().unwrap().map(|(seq, _)| seq) != Some(4) {
            assert!(tokio::time::Instant::now() < deadline, "snapshot 4 never written");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // No graceful shutdown: sequence 5 is lost with the process.
        drop(service);
        drop(node);

        let node = NodeRuntime::start(node_config(dir.path())).await.unwrap();
        assert_eq!(node.cluster().local().last_applied(), 4);
        let balance = node.service().get_balance(owner.balance()).await.unwrap();
        assert_eq!(balance.body.balance, 30);

        let next = node.service().load_money(owner.load_money(1)).await.unwrap();
        assert_eq!(next.body.balance, 31);
        assert_eq!(node.cluster().local().last_applied(), 5);
        node.shutdown().await.unwrap();
    }
}
