use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use shared_types::{AuditEntry, ContractId, ContractRecord, Sequence};

use crate::domain::{Projection, StoreError, StoreWrite};
use crate::ports::{checked_sum, ReadStore};

#[derive(Debug, Default)]
struct Tables {
    contracts: BTreeMap<ContractId, ContractRecord>,
    audit: Vec<AuditEntry>,
    applied: Sequence,
}

impl Tables {
    fn validate(&self, writes: &[StoreWrite]) -> Result<(), StoreError> {
        for (i, write) in writes.iter().enumerate() {
            if let StoreWrite::UpsertBalance { id, .. } = write {
                let inserted_earlier = writes[..i].iter().any(
                    |w| matches!(w, StoreWrite::InsertContract { id: new, .. } if new == id),
                );
                if !inserted_earlier && !self.contracts.contains_key(id) {
                    return Err(StoreError::MissingContract(id.clone()));
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, write: &StoreWrite) {
        match write {
            StoreWrite::InsertContract {
                id,
                public_key,
                shared_secret,
            } => {
                self.contracts
                    .entry(id.clone())
                    .or_insert_with(|| ContractRecord::new(public_key.clone(), shared_secret.clone()));
            }
            StoreWrite::UpsertBalance { id, balance } => {
                if let Some(record) = self.contracts.get_mut(id) {
                    record.balance = *balance;
                }
            }
            StoreWrite::AppendAudit(entry) => self.audit.push(entry.clone()),
        }
    }
}

/// Read store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReadStore {
    tables: RwLock<Tables>,
}

impl InMemoryReadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadStore for InMemoryReadStore {
    fn upsert_balance(&self, id: &ContractId, balance: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let record = tables
            .contracts
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingContract(id.clone()))?;
        record.balance = balance;
        Ok(())
    }

    fn insert_contract(
        &self,
        id: &ContractId,
        public_key: &[u8],
        shared_secret: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        self.tables.write().write(&StoreWrite::InsertContract {
            id: id.clone(),
            public_key: public_key.to_vec(),
            shared_secret: shared_secret.map(<[u8]>::to_vec),
        });
        Ok(())
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.tables.write().audit.push(entry.clone());
        Ok(())
    }

    fn sum_balances(&self, ids: &[ContractId]) -> Result<i64, StoreError> {
        let tables = self.tables.read();
        checked_sum(
            ids.iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter_map(|id| tables.contracts.get(id).map(|r| r.balance)),
        )
    }

    fn sum_all(&self) -> Result<i64, StoreError> {
        checked_sum(self.tables.read().contracts.values().map(|r| r.balance))
    }

    fn list_all(&self) -> Result<Vec<(ContractId, ContractRecord)>, StoreError> {
        Ok(self
            .tables
            .read()
            .contracts
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    fn get_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, StoreError> {
        Ok(self.tables.read().contracts.get(id).cloned())
    }

    fn audit_for(&self, id: &ContractId) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .tables
            .read()
            .audit
            .iter()
            .filter(|entry| entry.involves(id))
            .cloned()
            .collect())
    }

    fn applied_sequence(&self) -> Result<Sequence, StoreError> {
        Ok(self.tables.read().applied)
    }

    fn apply_projection(&self, projection: &Projection) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if projection.sequence <= tables.applied {
            return Ok(false);
        }
        tables.validate(&projection.writes)?;
        for write in &projection.writes {
            tables.write(write);
        }
        tables.applied = projection.sequence;
        Ok(true)
    }

    fn rebase(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if sequence <= tables.applied {
            return Ok(false);
        }
        tables.contracts = contracts.iter().cloned().collect();
        tables.applied = sequence;
        Ok(true)
    }

    fn rewind(
        &self,
        sequence: Sequence,
        contracts: &[(ContractId, ContractRecord)],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.contracts = contracts.iter().cloned().collect();
        tables.audit.retain(|entry| entry.sequence <= sequence);
        tables.applied = sequence;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::AuditOperation;

    fn id(name: &str) -> ContractId {
        ContractId::from_bytes(name.as_bytes()).unwrap()
    }

    fn audit(sequence: Sequence, origin: &str, destination: Option<&str>) -> StoreWrite {
        StoreWrite::AppendAudit(AuditEntry {
            sequence,
            operation: AuditOperation::CreateContract,
            origin: id(origin),
            destination: destination.map(id),
        })
    }

    fn create(sequence: Sequence, name: &str) -> Projection {
        Projection {
            sequence,
            writes: vec![
                StoreWrite::InsertContract {
                    id: id(name),
                    public_key: vec![2; 33],
                    shared_secret: None,
                },
                audit(sequence, name, None),
            ],
        }
    }

    #[test]
    fn test_projection_is_idempotent_per_sequence() {
        let store = InMemoryReadStore::new();
        assert!(store.apply_projection(&create(1, "a")).unwrap());
        assert!(!store.apply_projection(&create(1, "a")).unwrap());

        assert_eq!(store.applied_sequence().unwrap(), 1);
        assert_eq!(store.audit_for(&id("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_projection_writes_nothing() {
        let store = InMemoryReadStore::new();
        let projection = Projection {
            sequence: 1,
            writes: vec![
                audit(1, "a", None),
                StoreWrite::UpsertBalance {
                    id: id("ghost"),
                    balance: 5,
                },
            ],
        };

        assert_eq!(
            store.apply_projection(&projection),
            Err(StoreError::MissingContract(id("ghost")))
        );
        assert_eq!(store.applied_sequence().unwrap(), 0);
        assert!(store.audit_for(&id("a")).unwrap().is_empty());
    }

    #[test]
    fn test_sums_and_listing() {
        let store = InMemoryReadStore::new();
        store.apply_projection(&create(1, "a")).unwrap();
        store.apply_projection(&create(2, "b")).unwrap();
        store.upsert_balance(&id("a"), 600).unwrap();
        store.upsert_balance(&id("b"), 400).unwrap();

        assert_eq!(store.sum_all().unwrap(), 1000);
        assert_eq!(store.sum_balances(&[id("a"), id("zz")]).unwrap(), 600);
        let listed: Vec<_> = store.list_all().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(listed, vec![id("a"), id("b")]);
    }

    #[test]
    fn test_sum_counts_repeated_id_once() {
        let store = InMemoryReadStore::new();
        store.apply_projection(&create(1, "a")).unwrap();
        store.apply_projection(&create(2, "b")).unwrap();
        store.upsert_balance(&id("a"), 600).unwrap();
        store.upsert_balance(&id("b"), 400).unwrap();

        assert_eq!(store.sum_balances(&[id("a"), id("a")]).unwrap(), 600);
        assert_eq!(store.sum_balances(&[id("b"), id("a"), id("b")]).unwrap(), 1000);
    }

    #[test]
    fn test_audit_for_includes_destination_in_order() {
        let store = InMemoryReadStore::new();
        store.append_audit(&AuditEntry {
            sequence: 4,
            operation: AuditOperation::SendTransaction { amount: 1 },
            origin: id("a"),
            destination: Some(id("b")),
        })
        .unwrap();
        store.append_audit(&AuditEntry {
            sequence: 5,
            operation: AuditOperation::LoadMoney { amount: 1 },
            origin: id("b"),
            destination: None,
        })
        .unwrap();

        let sequences: Vec<_> = store
            .audit_for(&id("b"))
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, vec![4, 5]);
        assert_eq!(store.audit_for(&id("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_rebase_replaces_contracts_keeps_audit() {
        let store = InMemoryReadStore::new();
        store.apply_projection(&create(1, "a")).unwrap();

        let mut record = ContractRecord::new(vec![3; 33], None);
        record.balance = 77;
        assert!(store.rebase(10, &[(id("b"), record)]).unwrap());

        assert_eq!(store.get_contract(&id("a")).unwrap(), None);
        assert_eq!(store.get_contract(&id("b")).unwrap().unwrap().balance, 77);
        assert_eq!(store.applied_sequence().unwrap(), 10);
        assert_eq!(store.audit_for(&id("a")).unwrap().len(), 1);

        // Older rebases and projections are ignored.
        assert!(!store.rebase(5, &[]).unwrap());
        assert!(!store.apply_projection(&create(7, "c")).unwrap());
    }

    #[test]
    fn test_rewind_drops_later_history() {
        let store = InMemoryReadStore::new();
        store.apply_projection(&create(1, "a")).unwrap();
        store.apply_projection(&create(2, "b")).unwrap();
        store.apply_projection(&create(3, "c")).unwrap();

        let mut record = ContractRecord::new(vec![2; 33], None);
        record.balance = 5;
        store.rewind(1, &[(id("a"), record)]).unwrap();

        assert_eq!(store.applied_sequence().unwrap(), 1);
        assert_eq!(store.get_contract(&id("a")).unwrap().unwrap().balance, 5);
        assert_eq!(store.get_contract(&id("b")).unwrap(), None);
        assert_eq!(store.audit_for(&id("a")).unwrap().len(), 1);
        assert!(store.audit_for(&id("c")).unwrap().is_empty());

        // Sequence 2 is projected again as a different commit.
        assert!(store.apply_projection(&create(2, "d")).unwrap());
        assert_eq!(store.applied_sequence().unwrap(), 2);
    }

    #[test]
    fn test_upsert_unknown_contract_fails() {
        let store = InMemoryReadStore::new();
        assert!(matches!(
            store.upsert_balance(&id("x"), 1),
            Err(StoreError::MissingContract(_))
        ));
    }
}
