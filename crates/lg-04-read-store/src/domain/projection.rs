//! Translation of committed results into read-store writes.
//!
//! Only successful commands touch the store. A rejected command still yields
//! a projection with no writes so the applied watermark advances past it.

use shared_types::{
    AuditEntry, Command, CommandOutcome, CommitRecord, ContractId, Sequence,
};

/// One write of the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    InsertContract {
        id: ContractId,
        public_key: Vec<u8>,
        shared_secret: Option<Vec<u8>>,
    },
    UpsertBalance {
        id: ContractId,
        balance: i64,
    },
    AppendAudit(AuditEntry),
}

/// All writes produced by one committed command. Applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub sequence: Sequence,
    pub writes: Vec<StoreWrite>,
}

impl Projection {
    pub fn from_commit(record: &CommitRecord) -> Self {
        let Ok(outcome) = &record.result else {
            return Self {
                sequence: record.sequence,
                writes: Vec::new(),
            };
        };

        let mut writes = Vec::with_capacity(3);
        match (&record.command, outcome) {
            (
                Command::CreateContract {
                    id,
                    public_key,
                    shared_secret,
                },
                CommandOutcome::Created { .. },
            ) => {
                writes.push(StoreWrite::InsertContract {
                    id: id.clone(),
                    public_key: public_key.clone(),
                    shared_secret: shared_secret.clone(),
                });
            }
            (_, CommandOutcome::Created { id }) => {
                // Outcome without its command; nothing to register.
                tracing::warn!(contract = %id, "Created outcome for a non-create command");
            }
            (_, CommandOutcome::Loaded { id, balance }) => {
                writes.push(StoreWrite::UpsertBalance {
                    id: id.clone(),
                    balance: *balance,
                });
            }
            (
                _,
                CommandOutcome::Transferred {
                    origin,
                    origin_balance,
                    destination,
                    destination_balance,
                },
            ) => {
                writes.push(StoreWrite::UpsertBalance {
                    id: origin.clone(),
                    balance: *origin_balance,
                });
                writes.push(StoreWrite::UpsertBalance {
                    id: destination.clone(),
                    balance: *destination_balance,
                });
            }
        }

        let destination = match &record.command {
            Command::SendTransaction { destination, .. } => Some(destination.clone()),
            _ => None,
        };
        writes.push(StoreWrite::AppendAudit(AuditEntry {
            sequence: record.sequence,
            operation: record.command.audit_operation(),
            origin: record.command.origin().clone(),
            destination,
        }));

        Self {
            sequence: record.sequence,
            writes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
