//! # Wire Messages
//!
//! JSON request and response bodies. Binary fields travel as standard
//! base64; contract ids are already base64 text.
//!
//! | RPC | Request canonical bytes | Response canonical bytes |
//! |-----|-------------------------|--------------------------|
//! | createContract | `id ‖ secret? ‖ publicKey` | `id ‖ servicePublicKey` |
//! | loadMoney | `id ‖ amount` | `id ‖ newBalance` |
//! | sendTransaction | `origin ‖ destination ‖ amount ‖ nonce` | same as request |
//! | getBalance | `id` | `id ‖ balance` |
//! | getExtract | `id` | `id ‖ extract` |
//! | getTotalValue | `id1 ‖ … ‖ idN` | `id1 ‖ … ‖ idN ‖ total` |
//! | getGlobalLedgerValue | `id` | `id ‖ total` |
//! | getLedger | `id` | `id ‖ row1 ‖ … ‖ rowN` |

use serde::{Deserialize, Serialize};
use shared_types::{ContractId, ContractKeys};

use crate::domain::{CanonicalBytes, Canonical, SignedRequest};

/// Serde adapter for `Vec<u8>` as standard base64.
pub mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}

/// Serde adapter for `Option<Vec<u8>>` as optional base64.
pub mod b64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| STANDARD.decode(text.as_bytes()).map_err(D::Error::custom))
            .transpose()
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractRequest {
    pub contract: ContractId,
    #[serde(with = "b64")]
    pub public_key: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<Vec<u8>>,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

impl Canonical for CreateContractRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .raw(self.shared_secret.as_deref().unwrap_or_default())
            .raw(&self.public_key)
            .finish()
    }
}

impl SignedRequest for CreateContractRequest {
    fn operation(&self) -> &'static str {
        "createContract"
    }
    fn signer(&self) -> &ContractId {
        &self.contract
    }
    fn signature(&self) -> &[u8] {
        &self.signature
    }
    fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }
    fn asserted_keys(&self) -> Option<ContractKeys> {
        Some(ContractKeys {
            public_key: self.public_key.clone(),
            shared_secret: self.shared_secret.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoneyRequest {
    pub contract: ContractId,
    pub amount: i64,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

impl Canonical for LoadMoneyRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .amount(self.amount)
            .finish()
    }
}

impl SignedRequest for LoadMoneyRequest {
    fn operation(&self) -> &'static str {
        "loadMoney"
    }
    fn signer(&self) -> &ContractId {
        &self.contract
    }
    fn signature(&self) -> &[u8] {
        &self.signature
    }
    fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionRequest {
    pub origin: ContractId,
    pub destination: ContractId,
    pub amount: i64,
    pub nonce: String,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

impl Canonical for SendTransactionRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.origin)
            .contract(&self.destination)
            .amount(self.amount)
            .text(&self.nonce)
            .finish()
    }
}

impl SignedRequest for SendTransactionRequest {
    fn operation(&self) -> &'static str {
        "sendTransaction"
    }
    fn signer(&self) -> &ContractId {
        &self.origin
    }
    fn signature(&self) -> &[u8] {
        &self.signature
    }
    fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }
    fn nonce(&self) -> Option<&str> {
        Some(&self.nonce)
    }
}

/// Single-contract query: getBalance, getExtract, getGlobalLedgerValue,
/// getLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractQueryRequest {
    pub contract: ContractId,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

impl Canonical for ContractQueryRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new().contract(&self.contract).finish()
    }
}

impl SignedRequest for ContractQueryRequest {
    fn operation(&self) -> &'static str {
        "contractQuery"
    }
    fn signer(&self) -> &ContractId {
        &self.contract
    }
    fn signature(&self) -> &[u8] {
        &self.signature
    }
    fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }
}

/// getTotalValue. Signed by the owner of the first listed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalValueRequest {
    pub contracts: Vec<ContractId>,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

impl TotalValueRequest {
    /// The first contract, whose keys verify the request.
    pub fn first(&self) -> Option<&ContractId> {
        self.contracts.first()
    }
}

impl Canonical for TotalValueRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new().contracts(&self.contracts).finish()
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// A response body sealed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signed<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub mac: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractResponse {
    pub contract: ContractId,
    #[serde(with = "b64")]
    pub service_public_key: Vec<u8>,
}

impl Canonical for CreateContractResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .raw(&self.service_public_key)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoneyResponse {
    pub contract: ContractId,
    pub balance: i64,
}

impl Canonical for LoadMoneyResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .amount(self.balance)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub origin: ContractId,
    pub destination: ContractId,
    pub amount: i64,
    pub nonce: String,
}

impl Canonical for SendTransactionResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.origin)
            .contract(&self.destination)
            .amount(self.amount)
            .text(&self.nonce)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub contract: ContractId,
    pub balance: i64,
}

impl Canonical for BalanceResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .amount(self.balance)
            .finish()
    }
}

/// Per-contract statement; one `seq:op:origin:destination` line per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub contract: ContractId,
    pub entries: Vec<String>,
}

impl ExtractResponse {
    /// The statement as one newline-separated text.
    pub fn extract_text(&self) -> String {
        self.entries.join("\n")
    }
}

impl Canonical for ExtractResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .text(&self.extract_text())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalValueResponse {
    pub contracts: Vec<ContractId>,
    pub total: i64,
}

impl Canonical for TotalValueResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contracts(&self.contracts)
            .amount(self.total)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValueResponse {
    pub contract: ContractId,
    pub total: i64,
}

impl Canonical for GlobalValueResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        CanonicalBytes::new()
            .contract(&self.contract)
            .amount(self.total)
            .finish()
    }
}

/// Full ledger listing; rows are `contract:balance:publicKeyBase64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub contract: ContractId,
    pub rows: Vec<String>,
}

impl Canonical for LedgerResponse {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.rows
            .iter()
            .fold(CanonicalBytes::new().contract(&self.contract), |acc, row| {
                acc.text(row)
            })
            .finish()
    }
}

/// Service key announcement (unsigned; clients pin it out of band).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    #[serde(with = "b64")]
    pub public_key: Vec<u8>,
}
