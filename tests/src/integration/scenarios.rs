//! # Client-Visible Flows
//!
//! Full request paths: envelope, ordering, apply, projection, sealed
//! response.

#[cfg(test)]
mod tests {
    use lg_02_envelope::VerificationPolicy;
    use lg_03_replication::ReplicaMode;
    use lg_05_ledger_service::LedgerApi;
    use shared_types::LedgerError;

    use crate::fixtures::TestLedger;

    #[tokio::test]
    async fn test_transfer_then_replay_rejected() {
        let ledger = TestLedger::start(4, VerificationPolicy::hmac_augmented());
        let c1 = ledger.client("c1", true);
        let c2 = ledger.client("c2", true);
        ledger.open_account(&c1, 1000).await;
        ledger.open_account(&c2, 0).await;

        let transfer = c1.send_transaction_with_nonce(c2.contract(), 400, "n1");
        let sent = ledger.service.send_transaction(transfer.clone()).await.unwrap();
        c1.verify_response(&sent).unwrap();

        let replay = ledger.service.send_transaction(transfer).await.unwrap_err();
        assert!(matches!(replay, LedgerError::ReplayFailure(_)));

        assert_eq!(ledger.balance(&c1).await, 600);
        assert_eq!(ledger.balance(&c2).await, 400);
        let global = ledger
            .service
            .get_global_ledger_value(c1.contract_query())
            .await
            .unwrap();
        assert_eq!(global.body.total, 1000);
    }

    #[tokio::test]
    async fn test_overdraft_rejected_everywhere() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let c1 = ledger.client("c1", false);
        let c2 = ledger.client("c2", false);
        ledger.open_account(&c1, 600).await;
        ledger.open_account(&c2, 0).await;

        let err = ledger
            .service
            .send_transaction(c1.send_transaction(c2.contract(), 10_000))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);

        // Every replica agreed on the rejection: same state, same sequence.
        let applied = ledger.cluster.local().last_applied();
        ledger.settle(applied).await;
        let digests = ledger.digests();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(ledger.balance(&c1).await, 600);

        // The rejection is not in anyone's statement.
        let extract = ledger.service.get_extract(c1.contract_query()).await.unwrap();
        assert_eq!(extract.body.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_lists_both_sides_of_a_transfer() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let c1 = ledger.client("c1", false);
        let c2 = ledger.client("c2", false);
        ledger.open_account(&c1, 100).await;
        ledger.open_account(&c2, 0).await;
        ledger
            .service
            .send_transaction(c1.send_transaction(c2.contract(), 30))
            .await
            .unwrap();

        let extract = ledger.service.get_extract(c2.contract_query()).await.unwrap();
        c2.verify_response(&extract).unwrap();
        let lines = extract.body.entries;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("CREATE_CONTRACT"));
        assert!(lines[1].contains("SEND_TRANSACTION 30"));
        assert!(lines[1].ends_with(c2.contract().as_str()));
    }

    #[tokio::test]
    async fn test_one_faulty_replica_is_tolerated() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        ledger.cluster.set_mode(2, ReplicaMode::Equivocating).unwrap();
        ledger.cluster.set_mode(3, ReplicaMode::Offline).unwrap();

        let c1 = ledger.client("c1", false);
        ledger.open_account(&c1, 75).await;
        assert_eq!(ledger.balance(&c1).await, 75);
    }

    #[tokio::test]
    async fn test_lost_quorum_reports_uncertainty_not_failure() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let c1 = ledger.client("c1", false);
        ledger.open_account(&c1, 10).await;

        for replica in 1..4 {
            ledger.cluster.set_mode(replica, ReplicaMode::Offline).unwrap();
        }
        let err = ledger
            .service
            .load_money(c1.load_money(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ExecutionUncertain(_)));
        assert!(!err.is_protocol_rejection());
    }

    #[tokio::test]
    async fn test_total_value_over_several_contracts() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let owners: Vec<_> = (0..3)
            .map(|i| ledger.client(&format!("c{i}"), false))
            .collect();
        for (i, owner) in owners.iter().enumerate() {
            ledger.open_account(owner, 100 * (i as i64 + 1)).await;
        }

        let others: Vec<_> = owners[1..].iter().map(|o| o.contract().clone()).collect();
        let total = ledger
            .service
            .get_total_value(owners[0].total_value(&others))
            .await
            .unwrap();
        owners[0].verify_response(&total).unwrap();
        assert_eq!(total.body.total, 600);
        assert_eq!(total.body.contracts.len(), 3);
    }
}
