//! Driving port: the RPC surface of the ledger.

use async_trait::async_trait;
use lg_02_envelope::{
    BalanceResponse, ContractQueryRequest, CreateContractRequest, CreateContractResponse,
    ExtractResponse, GlobalValueResponse, LedgerResponse, LoadMoneyRequest, LoadMoneyResponse,
    PublicKeyResponse, SendTransactionRequest, SendTransactionResponse, Signed,
    TotalValueRequest, TotalValueResponse,
};
use shared_types::LedgerError;

/// Ledger operations as exposed to a transport.
///
/// Every response is sealed by the service key. Mutating operations are
/// answered only after the command has been ordered and applied; they
/// never fall back to an unreplicated answer.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn create_contract(
        &self,
        request: CreateContractRequest,
    ) -> Result<Signed<CreateContractResponse>, LedgerError>;

    async fn load_money(
        &self,
        request: LoadMoneyRequest,
    ) -> Result<Signed<LoadMoneyResponse>, LedgerError>;

    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<Signed<SendTransactionResponse>, LedgerError>;

    /// Authoritative balance from the local replica.
    async fn get_balance(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<BalanceResponse>, LedgerError>;

    /// Statement of the contract from the audit log.
    async fn get_extract(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<ExtractResponse>, LedgerError>;

    /// Sum over the listed contracts, signed by the first one's owner.
    async fn get_total_value(
        &self,
        request: TotalValueRequest,
    ) -> Result<Signed<TotalValueResponse>, LedgerError>;

    async fn get_global_ledger_value(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<GlobalValueResponse>, LedgerError>;

    async fn get_ledger(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<LedgerResponse>, LedgerError>;

    fn service_public_key(&self) -> PublicKeyResponse;
}
