//! # Replica Determinism
//!
//! Random command streams pushed through the ordering boundary must leave
//! every replica in the same state, equal to a sequential replay, with
//! value conserved.

#[cfg(test)]
mod tests {
    use lg_01_state_machine::LedgerStateMachine;
    use lg_03_replication::ReplicationBoundary;
    use lg_02_envelope::VerificationPolicy;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_types::{decode, encode, Command, CommandResult, ContractId, Query, QueryResult};

    use crate::fixtures::{contract, TestLedger};

    fn random_command(rng: &mut StdRng, ids: &[ContractId]) -> Command {
        let pick = |rng: &mut StdRng| ids[rng.gen_range(0..ids.len())].clone();
        match rng.gen_range(0..10) {
            0 => Command::CreateContract {
                id: pick(rng),
                public_key: vec![2; 33],
                shared_secret: None,
            },
            1..=3 => Command::LoadMoney {
                id: pick(rng),
                amount: rng.gen_range(-5..500),
            },
            _ => Command::SendTransaction {
                origin: pick(rng),
                destination: pick(rng),
                amount: rng.gen_range(-5..300),
            },
        }
    }

    #[tokio::test]
    async fn test_random_streams_converge() {
        for seed in [1u64, 7, 42] {
            let mut rng = StdRng::seed_from_u64(seed);
            let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
            let ids: Vec<_> = (0..5).map(|i| contract(&format!("acct{i}"))).collect();

            let mut reference = LedgerStateMachine::new();
            let mut loaded = 0i64;
            let mut last = 0;
            for _ in 0..120 {
                let command = random_command(&mut rng, &ids);
                let reply = ledger
                    .cluster
                    .submit_ordered(encode(&command).unwrap())
                    .await
                    .unwrap();
                let agreed: CommandResult = decode(&reply.payload).unwrap();

                let expected = reference.apply(reply.sequence, &command);
                assert_eq!(agreed, expected, "seed {seed} sequence {}", reply.sequence);
                if let (Command::LoadMoney { amount, .. }, Ok(_)) = (&command, &expected) {
                    loaded += amount;
                }
                last = reply.sequence;
            }

            ledger.settle(last).await;
            let digests = ledger.digests();
            assert!(digests.windows(2).all(|w| w[0] == w[1]), "seed {seed}");
            assert_eq!(
                ledger.cluster.local().export_snapshot().unwrap().1,
                reference.export().unwrap()
            );

            let QueryResult::Sum { total, .. } = ledger.cluster.local().query(&Query::GlobalSum)
            else {
                panic!("unexpected query result");
            };
            assert_eq!(total, loaded, "value is conserved for seed {seed}");
            assert!(reference.contracts().all(|(_, record)| record.balance >= 0));
        }
    }

    #[tokio::test]
    async fn test_concurrent_submitters_get_distinct_sequences() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let id = contract("shared");
        ledger
            .cluster
            .submit_ordered(
                encode(&Command::CreateContract {
                    id: id.clone(),
                    public_key: vec![2; 33],
                    shared_secret: None,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cluster = ledger.cluster.clone();
                let bytes = encode(&Command::LoadMoney {
                    id: id.clone(),
                    amount: 10,
                })
                .unwrap();
                tokio::spawn(async move { cluster.submit_ordered(bytes).await })
            })
            .collect();

        let mut sequences = Vec::new();
        for task in tasks {
            sequences.push(task.await.unwrap().unwrap().sequence);
        }
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), 16);

        ledger.settle(17).await;
        assert!(ledger.digests().windows(2).all(|w| w[0] == w[1]));
        assert!(matches!(
            ledger.cluster.local().query(&Query::Balance(id)),
            QueryResult::Balance(Some(160))
        ));
    }
}
