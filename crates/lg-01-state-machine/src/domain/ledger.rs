//! # Ledger State Machine
//!
//! The authoritative contract map. Every method here is deterministic: the
//! same command sequence always produces the same map and the same results,
//! on any machine.
//!
//! ## Invariants
//!
//! - Balances are never negative.
//! - `total_supply == sum(balances) == sum(committed LoadMoney amounts)`.
//! - A transfer debits and credits inside one `&mut self` call, so no reader
//!   holding a shared borrow can observe half of it.
//! - Credits are checked against `i64` overflow of both the balance and the
//!   total supply, so every sum of balances fits in an `i64`.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{
    ApplyRejection, Command, CommandOutcome, CommandResult, ContractId, ContractRecord, Query,
    QueryResult, Sequence,
};
use tracing::trace;

use super::snapshot::SnapshotBody;
use super::StateError;

/// Deterministic contract map plus the last applied sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStateMachine {
    contracts: BTreeMap<ContractId, ContractRecord>,
    last_applied: Sequence,
    total_supply: i64,
}

impl LedgerStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from snapshot bytes.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, StateError> {
        let mut machine = Self::new();
        machine.install(bytes)?;
        Ok(machine)
    }

    pub fn last_applied(&self) -> Sequence {
        self.last_applied
    }

    pub fn total_supply(&self) -> i64 {
        self.total_supply
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn get(&self, id: &ContractId) -> Option<&ContractRecord> {
        self.contracts.get(id)
    }

    /// Iterate contracts in id order.
    pub fn contracts(&self) -> impl Iterator<Item = (&ContractId, &ContractRecord)> {
        self.contracts.iter()
    }

    /// Apply one ordered command at `sequence`.
    pub fn apply(&mut self, sequence: Sequence, command: &Command) -> CommandResult {
        let result = match command {
            Command::CreateContract {
                id,
                public_key,
                shared_secret,
            } => self.create_contract(id, public_key, shared_secret.as_deref()),
            Command::LoadMoney { id, amount } => self.load_money(id, *amount),
            Command::SendTransaction {
                origin,
                destination,
                amount,
            } => self.send_transaction(origin, destination, *amount),
        };
        self.last_applied = sequence;
        trace!(sequence, kind = command.kind(), ok = result.is_ok(), "applied");
        result
    }

    fn create_contract(
        &mut self,
        id: &ContractId,
        public_key: &[u8],
        shared_secret: Option<&[u8]>,
    ) -> CommandResult {
        if self.contracts.contains_key(id) {
            return Err(ApplyRejection::ContractAlreadyExists);
        }
        self.contracts.insert(
            id.clone(),
            ContractRecord::new(public_key.to_vec(), shared_secret.map(<[u8]>::to_vec)),
        );
        Ok(CommandOutcome::Created { id: id.clone() })
    }

    fn load_money(&mut self, id: &ContractId, amount: i64) -> CommandResult {
        if amount <= 0 {
            return Err(ApplyRejection::InvalidAmount);
        }
        let record = self
            .contracts
            .get_mut(id)
            .ok_or(ApplyRejection::ContractDoesNotExist)?;

        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ApplyRejection::BalanceOverflow)?;
        let balance = record
            .balance
            .checked_add(amount)
            .ok_or(ApplyRejection::BalanceOverflow)?;

        record.balance = balance;
        self.total_supply = supply;
        Ok(CommandOutcome::Loaded {
            id: id.clone(),
            balance,
        })
    }

    fn send_transaction(
        &mut self,
        origin: &ContractId,
        destination: &ContractId,
        amount: i64,
    ) -> CommandResult {
        if amount <= 0 {
            return Err(ApplyRejection::InvalidAmount);
        }
        let origin_balance = self
            .contracts
            .get(origin)
            .ok_or(ApplyRejection::ContractDoesNotExist)?
            .balance;
        let destination_balance = self
            .contracts
            .get(destination)
            .ok_or(ApplyRejection::ContractDoesNotExist)?
            .balance;

        if origin_balance < amount {
            return Err(ApplyRejection::InsufficientFunds);
        }

        if origin == destination {
            return Ok(CommandOutcome::Transferred {
                origin: origin.clone(),
                origin_balance,
                destination: destination.clone(),
                destination_balance,
            });
        }

        // Compute both sides before touching the map.
        let new_origin = origin_balance - amount;
        let new_destination = destination_balance
            .checked_add(amount)
            .ok_or(ApplyRejection::BalanceOverflow)?;

        if let Some(record) = self.contracts.get_mut(origin) {
            record.balance = new_origin;
        }
        if let Some(record) = self.contracts.get_mut(destination) {
            record.balance = new_destination;
        }

        Ok(CommandOutcome::Transferred {
            origin: origin.clone(),
            origin_balance: new_origin,
            destination: destination.clone(),
            destination_balance: new_destination,
        })
    }

    /// Answer a read-only query.
    pub fn query(&self, query: &Query) -> QueryResult {
        match query {
            Query::Balance(id) => QueryResult::Balance(self.contracts.get(id).map(|r| r.balance)),
            Query::ContractKeys(id) => {
                QueryResult::ContractKeys(self.contracts.get(id).map(ContractRecord::keys))
            }
            Query::Exists(id) => QueryResult::Exists(self.contracts.contains_key(id)),
            Query::GlobalSum => QueryResult::Sum {
                total: self.total_supply,
                missing: Vec::new(),
            },
            Query::SumOf(ids) => {
                let mut total = 0i64;
                let mut missing = Vec::new();
                // Each contract counts once, however often it is listed.
                for id in ids.iter().collect::<BTreeSet<_>>() {
                    match self.contracts.get(id) {
                        Some(record) => total = total.saturating_add(record.balance),
                        None => missing.push(id.clone()),
                    }
                }
                QueryResult::Sum { total, missing }
            }
            Query::ContractCount => QueryResult::Count(self.contracts.len() as u64),
        }
    }

    /// Serialize the complete state.
    pub fn export(&self) -> Result<Vec<u8>, StateError> {
        SnapshotBody {
            sequence: self.last_applied,
            contracts: self
                .contracts
                .iter()
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect(),
        }
        .encode()
    }

    /// Replace the complete state. On error the current state is untouched.
    pub fn install(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let body = SnapshotBody::decode(bytes)?;

        let mut total_supply = 0i64;
        for (id, record) in &body.contracts {
            total_supply = total_supply.checked_add(record.balance).ok_or_else(|| {
                StateError::SnapshotInvalid(format!("total supply overflows at {id}"))
            })?;
        }

        self.contracts = body.contracts.into_iter().collect();
        self.last_applied = body.sequence;
        self.total_supply = total_supply;
        Ok(())
    }
}
