//! # Client Request Builder
//!
//! Builds signed (and, when the client holds a shared secret, MAC'd)
//! requests and checks sealed responses. Private keys never leave the
//! client.

use shared_crypto::{
    compute_mac, derive_contract_id, sha256, verify_mac, verify_signature, Secp256k1KeyPair,
    Secp256k1PublicKey, SharedSecret,
};
use shared_types::{CodecError, ContractId};
use uuid::Uuid;

use crate::domain::{Canonical, CanonicalBytes, EnvelopeError};
use crate::wire::{
    ContractQueryRequest, CreateContractRequest, LoadMoneyRequest, SendTransactionRequest,
    Signed, TotalValueRequest,
};

/// A contract owner's identity.
pub struct LedgerClient {
    contract: ContractId,
    keypair: Secp256k1KeyPair,
    secret: Option<SharedSecret>,
    service_key: Option<Vec<u8>>,
}

impl LedgerClient {
    pub fn new(contract: ContractId, keypair: Secp256k1KeyPair, secret: Option<SharedSecret>) -> Self {
        Self {
            contract,
            keypair,
            secret,
            service_key: None,
        }
    }

    /// Fresh key pair, plus a random shared secret when `with_secret`.
    pub fn generate(contract: ContractId, with_secret: bool) -> Self {
        let secret = with_secret.then(SharedSecret::generate);
        Self::new(contract, Secp256k1KeyPair::generate(), secret)
    }

    /// Contract id from `sha256(identity) ‖ timestamp_ms`.
    pub fn derive_id(identity: &str, timestamp_ms: u64) -> Result<ContractId, CodecError> {
        let user = sha256(identity.as_bytes());
        let digest = derive_contract_id(&[&user, &timestamp_ms.to_be_bytes()]);
        ContractId::from_bytes(&digest)
    }

    /// Pin the service key used by [`verify_response`](Self::verify_response).
    pub fn with_service_key(mut self, key: Vec<u8>) -> Self {
        self.service_key = Some(key);
        self
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn public_key(&self) -> Secp256k1PublicKey {
        self.keypair.public_key()
    }

    pub fn shared_secret(&self) -> Option<&[u8]> {
        self.secret.as_ref().map(SharedSecret::as_bytes)
    }

    fn seal(&self, canonical: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
        let signature = self.keypair.sign(canonical).as_bytes().to_vec();
        let mac = self
            .shared_secret()
            .and_then(|secret| compute_mac(canonical, secret).ok())
            .map(|tag| tag.to_vec());
        (signature, mac)
    }

    pub fn create_contract(&self) -> CreateContractRequest {
        let mut request = CreateContractRequest {
            contract: self.contract.clone(),
            public_key: self.public_key().to_vec(),
            shared_secret: self.shared_secret().map(<[u8]>::to_vec),
            signature: Vec::new(),
            mac: None,
        };
        (request.signature, request.mac) = self.seal(&request.canonical_bytes());
        request
    }

    pub fn load_money(&self, amount: i64) -> LoadMoneyRequest {
        let mut request = LoadMoneyRequest {
            contract: self.contract.clone(),
            amount,
            signature: Vec::new(),
            mac: None,
        };
        (request.signature, request.mac) = self.seal(&request.canonical_bytes());
        request
    }

    /// Transfer with a fresh random nonce.
    pub fn send_transaction(&self, destination: &ContractId, amount: i64) -> SendTransactionRequest {
        self.send_transaction_with_nonce(destination, amount, &Uuid::new_v4().to_string())
    }

    pub fn send_transaction_with_nonce(
        &self,
        destination: &ContractId,
        amount: i64,
        nonce: &str,
    ) -> SendTransactionRequest {
        let mut request = SendTransactionRequest {
            origin: self.contract.clone(),
            destination: destination.clone(),
            amount,
            nonce: nonce.to_string(),
            signature: Vec::new(),
            mac: None,
        };
        (request.signature, request.mac) = self.seal(&request.canonical_bytes());
        request
    }

    /// Query for this contract: getBalance, getExtract,
    /// getGlobalLedgerValue and getLedger all take this shape.
    pub fn contract_query(&self) -> ContractQueryRequest {
        let mut request = ContractQueryRequest {
            contract: self.contract.clone(),
            signature: Vec::new(),
            mac: None,
        };
        (request.signature, request.mac) = self.seal(&request.canonical_bytes());
        request
    }

    pub fn balance(&self) -> ContractQueryRequest {
        self.contract_query()
    }

    /// getTotalValue over this contract followed by `others`.
    pub fn total_value(&self, others: &[ContractId]) -> TotalValueRequest {
        let contracts: Vec<_> = std::iter::once(self.contract.clone())
            .chain(others.iter().cloned())
            .collect();
        let canonical = CanonicalBytes::new().contracts(&contracts).finish();
        let (signature, mac) = self.seal(&canonical);
        TotalValueRequest {
            contracts,
            signature,
            mac,
        }
    }

    /// Check a sealed response against the pinned service key and, when
    /// both sides hold a secret and a MAC was sent, the response MAC.
    pub fn verify_response<T: Canonical>(&self, response: &Signed<T>) -> Result<(), EnvelopeError> {
        let service_key = self
            .service_key
            .as_deref()
            .ok_or_else(|| EnvelopeError::Authentication("service key not pinned".into()))?;
        let canonical = response.body.canonical_bytes();

        if let (Some(tag), Some(secret)) = (response.mac.as_deref(), self.shared_secret()) {
            verify_mac(&canonical, tag, secret)
                .map_err(|e| EnvelopeError::Integrity(e.to_string()))?;
        }
        verify_signature(&canonical, &response.signature, service_key)
            .map_err(|e| EnvelopeError::Authentication(e.to_string()))
    }
}
