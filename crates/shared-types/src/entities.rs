//! # Core Ledger Entities
//!
//! ## Clusters
//!
//! - **Contracts**: `ContractId`, `ContractRecord`, `ContractKeys`
//! - **Commands**: `Command`, `CommandOutcome`, `ApplyRejection`, `CommitRecord`,
//!   `CommitEvent`
//! - **Queries**: `Query`, `QueryResult`
//! - **Audit**: `AuditOperation`, `AuditEntry`

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::CodecError;

/// Position of a command in the agreed total order (1-based).
pub type Sequence = u64;

// =============================================================================
// CLUSTER A: CONTRACTS
// =============================================================================

/// Contract (account) identifier.
///
/// Carried as standard base64 text on the wire; the decoded bytes are the
/// identifier. The text form is canonical, so two ids are equal iff their
/// bytes are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId {
    text: String,
    bytes: Vec<u8>,
}

impl ContractId {
    /// Build an id from raw identifier bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::EmptyContractId);
        }
        Ok(Self {
            text: STANDARD.encode(bytes),
            bytes: bytes.to_vec(),
        })
    }

    /// Parse base64 text.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| CodecError::InvalidBase64(format!("contract id: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Base64 text form.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Decoded identifier bytes (the form that is signed).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<String> for ContractId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContractId> for String {
    fn from(id: ContractId) -> Self {
        id.text
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractId({})", self.text)
    }
}

/// Authoritative per-contract record held by the state machine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Current balance. Never negative.
    pub balance: i64,
    /// SEC1 public key of the contract owner.
    pub public_key: Vec<u8>,
    /// Shared secret for MAC verification, if the contract registered one.
    pub shared_secret: Option<Vec<u8>>,
}

impl ContractRecord {
    /// Fresh record with a zero balance.
    pub fn new(public_key: Vec<u8>, shared_secret: Option<Vec<u8>>) -> Self {
        Self {
            balance: 0,
            public_key,
            shared_secret,
        }
    }

    /// Verification material for this contract.
    pub fn keys(&self) -> ContractKeys {
        ContractKeys {
            public_key: self.public_key.clone(),
            shared_secret: self.shared_secret.clone(),
        }
    }
}

impl fmt::Debug for ContractRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractRecord")
            .field("balance", &self.balance)
            .field("public_key", &STANDARD.encode(&self.public_key))
            .field("has_secret", &self.shared_secret.is_some())
            .finish()
    }
}

/// Keys needed to verify a contract owner's requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractKeys {
    /// SEC1 public key.
    pub public_key: Vec<u8>,
    /// Optional HMAC secret.
    pub shared_secret: Option<Vec<u8>>,
}

impl fmt::Debug for ContractKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractKeys")
            .field("public_key", &STANDARD.encode(&self.public_key))
            .field("has_secret", &self.shared_secret.is_some())
            .finish()
    }
}

// =============================================================================
// CLUSTER B: COMMANDS
// =============================================================================

/// An ordered, mutating ledger command.
///
/// Applying a command must be a pure function of (state, command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Register a new contract with a zero balance.
    CreateContract {
        /// New contract id.
        id: ContractId,
        /// Owner public key.
        public_key: Vec<u8>,
        /// Optional shared secret.
        shared_secret: Option<Vec<u8>>,
    },
    /// Credit a contract.
    LoadMoney {
        /// Target contract.
        id: ContractId,
        /// Amount to credit (> 0).
        amount: i64,
    },
    /// Move value between two contracts.
    SendTransaction {
        /// Debited contract.
        origin: ContractId,
        /// Credited contract.
        destination: ContractId,
        /// Amount to move (> 0).
        amount: i64,
    },
}

impl Command {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateContract { .. } => "create_contract",
            Self::LoadMoney { .. } => "load_money",
            Self::SendTransaction { .. } => "send_transaction",
        }
    }

    /// Contract the command acts on (the origin for transfers).
    pub fn origin(&self) -> &ContractId {
        match self {
            Self::CreateContract { id, .. } | Self::LoadMoney { id, .. } => id,
            Self::SendTransaction { origin, .. } => origin,
        }
    }

    /// Audit tag for this command.
    pub fn audit_operation(&self) -> AuditOperation {
        match self {
            Self::CreateContract { .. } => AuditOperation::CreateContract,
            Self::LoadMoney { amount, .. } => AuditOperation::LoadMoney { amount: *amount },
            Self::SendTransaction { amount, .. } => {
                AuditOperation::SendTransaction { amount: *amount }
            }
        }
    }
}

/// Successful effect of an applied command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Contract inserted.
    Created {
        /// The created id.
        id: ContractId,
    },
    /// Money loaded.
    Loaded {
        /// Credited contract.
        id: ContractId,
        /// Balance after the credit.
        balance: i64,
    },
    /// Transfer applied.
    Transferred {
        /// Debited contract.
        origin: ContractId,
        /// Origin balance after the debit.
        origin_balance: i64,
        /// Credited contract.
        destination: ContractId,
        /// Destination balance after the credit.
        destination_balance: i64,
    },
}

/// Deterministic, ledger-semantic rejection produced by the apply step.
///
/// Every correct replica produces the same rejection for the same command
/// and pre-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ApplyRejection {
    /// The id is already registered.
    #[error("contract already exists")]
    ContractAlreadyExists,
    /// A referenced contract is not registered.
    #[error("contract does not exist")]
    ContractDoesNotExist,
    /// The origin balance is below the amount.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Amount was zero or negative.
    #[error("amount must be positive")]
    InvalidAmount,
    /// The credit would overflow the 64-bit balance or total supply.
    #[error("balance overflow")]
    BalanceOverflow,
}

impl ApplyRejection {
    /// Short label used in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ContractAlreadyExists => "contract_already_exists",
            Self::ContractDoesNotExist => "contract_does_not_exist",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidAmount => "invalid_amount",
            Self::BalanceOverflow => "balance_overflow",
        }
    }
}

/// Result of applying one command.
pub type CommandResult = Result<CommandOutcome, ApplyRejection>;

/// One entry of a replica's commit feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Agreed position of the command.
    pub sequence: Sequence,
    /// The command as delivered.
    pub command: Command,
    /// The deterministic result.
    pub result: CommandResult,
}

/// What a replica's commit feed carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitEvent {
    /// One command applied in order.
    Committed(CommitRecord),
    /// State replaced wholesale by a snapshot at `sequence`; commands up to
    /// and including `sequence` will never be delivered individually.
    Rebased {
        /// Sequence captured by the snapshot.
        sequence: Sequence,
        /// Every contract, ascending by id.
        contracts: Vec<(ContractId, ContractRecord)>,
    },
}

impl CommitEvent {
    pub fn sequence(&self) -> Sequence {
        match self {
            Self::Committed(record) => record.sequence,
            Self::Rebased { sequence, .. } => *sequence,
        }
    }
}

// =============================================================================
// CLUSTER C: QUERIES
// =============================================================================

/// Read-only operation served on the unordered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Balance of one contract.
    Balance(ContractId),
    /// Verification keys of one contract.
    ContractKeys(ContractId),
    /// Membership check.
    Exists(ContractId),
    /// Sum of all balances.
    GlobalSum,
    /// Sum of the given contracts' balances.
    SumOf(Vec<ContractId>),
    /// Number of registered contracts.
    ContractCount,
}

/// Answer to a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
    /// `None` when the contract is unknown.
    Balance(Option<i64>),
    /// `None` when the contract is unknown.
    ContractKeys(Option<ContractKeys>),
    /// Membership.
    Exists(bool),
    /// A sum of balances. `missing` lists requested ids that are unknown.
    Sum {
        /// Sum over the known contracts.
        total: i64,
        /// Requested ids with no record.
        missing: Vec<ContractId>,
    },
    /// Contract count.
    Count(u64),
}

// =============================================================================
// CLUSTER D: AUDIT
// =============================================================================

/// Operation tag stored in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOperation {
    /// Contract registered.
    CreateContract,
    /// Money loaded.
    LoadMoney {
        /// Credited amount.
        amount: i64,
    },
    /// Transfer applied.
    SendTransaction {
        /// Moved amount.
        amount: i64,
    },
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateContract => f.write_str("CREATE_CONTRACT"),
            Self::LoadMoney { amount } => write!(f, "LOAD_MONEY {amount}"),
            Self::SendTransaction { amount } => write!(f, "SEND_TRANSACTION {amount}"),
        }
    }
}

/// Immutable, append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Commit sequence of the command that produced this entry.
    pub sequence: Sequence,
    /// What happened.
    pub operation: AuditOperation,
    /// Acting contract.
    pub origin: ContractId,
    /// Counterparty for transfers.
    pub destination: Option<ContractId>,
}

impl AuditEntry {
    /// Whether `id` is a party to this entry.
    pub fn involves(&self, id: &ContractId) -> bool {
        &self.origin == id || self.destination.as_ref() == Some(id)
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:", self.sequence, self.operation, self.origin)?;
        match &self.destination {
            Some(destination) => write!(f, "{destination}"),
            None => f.write_str("null"),
        }
    }
}
