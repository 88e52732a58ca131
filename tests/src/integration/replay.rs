//! # Concurrent Replay
//!
//! The same signed transfer raced from many tasks must be admitted exactly
//! once.

#[cfg(test)]
mod tests {
    use lg_02_envelope::VerificationPolicy;
    use lg_05_ledger_service::LedgerApi;
    use shared_types::LedgerError;

    use crate::fixtures::TestLedger;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_raced_transfer_applies_once() {
        let ledger = TestLedger::start(4, VerificationPolicy::hmac_augmented());
        let c1 = ledger.client("c1", true);
        let c2 = ledger.client("c2", true);
        ledger.open_account(&c1, 1000).await;
        ledger.open_account(&c2, 0).await;

        let transfer = c1.send_transaction_with_nonce(c2.contract(), 100, "race");
        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let service = ledger.service.clone();
                let request = transfer.clone();
                tokio::spawn(async move { service.send_transaction(request).await })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(LedgerError::ReplayFailure(nonce)) => assert_eq!(nonce, "race"),
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(ledger.balance(&c1).await, 900);
        assert_eq!(ledger.balance(&c2).await, 100);
    }

    #[tokio::test]
    async fn test_rejected_envelope_does_not_burn_nonce() {
        let ledger = TestLedger::start(4, VerificationPolicy::hmac_augmented());
        let c1 = ledger.client("c1", true);
        let c2 = ledger.client("c2", true);
        ledger.open_account(&c1, 50).await;
        ledger.open_account(&c2, 0).await;

        let good = c1.send_transaction_with_nonce(c2.contract(), 20, "n-1");
        let mut forged = good.clone();
        forged.amount = 49;
        assert!(matches!(
            ledger.service.send_transaction(forged).await,
            Err(LedgerError::IntegrityFailure(_))
        ));

        ledger.service.send_transaction(good).await.unwrap();
        assert_eq!(ledger.balance(&c2).await, 20);
    }
}
