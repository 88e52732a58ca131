//! # Ledger Service
//!
//! Orchestrates one request end to end:
//!
//! 1. Look up the signer's keys on the local replica (unordered query).
//! 2. Verify the envelope; nothing is submitted on failure.
//! 3. Submit the command for total ordering and wait for the agreed result.
//! 4. Optionally wait for the read store to catch up.
//! 5. Seal the response with the service key.
//!
//! Balances and key lookups are answered by the state machine. Extracts,
//! totals and the ledger listing come from the read store and may lag.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lg_02_envelope::{
    BalanceResponse, Canonical, ContractQueryRequest, CreateContractRequest,
    CreateContractResponse, EnvelopeError, EnvelopeParts, EnvelopeVerifier, ExtractResponse,
    GlobalValueResponse, LedgerResponse, LoadMoneyRequest, LoadMoneyResponse, PublicKeyResponse,
    ResponseSigner, SendTransactionRequest, SendTransactionResponse, Signed, SignedRequest,
    TotalValueRequest, TotalValueResponse,
};
use lg_03_replication::ReplicationBoundary;
use lg_04_read_store::{ReadStore, Reconciler, StoreError};
use shared_types::{
    decode, encode, Command, CommandOutcome, CommandResult, ContractId, ContractKeys,
    LedgerError, Query, QueryResult, Sequence,
};
use tracing::{info, warn};

use crate::domain::{RequestPhase, RequestTracker, ServiceConfig};
use crate::ports::LedgerApi;

pub struct LedgerService {
    boundary: Arc<dyn ReplicationBoundary>,
    store: Arc<dyn ReadStore>,
    reconciler: Option<Arc<Reconciler>>,
    verifier: EnvelopeVerifier,
    signer: ResponseSigner,
    config: ServiceConfig,
}

fn unexpected(what: impl std::fmt::Debug) -> LedgerError {
    LedgerError::Internal(format!("unexpected reply {what:?}"))
}

impl LedgerService {
    pub fn new(
        boundary: Arc<dyn ReplicationBoundary>,
        store: Arc<dyn ReadStore>,
        verifier: EnvelopeVerifier,
        signer: ResponseSigner,
        config: ServiceConfig,
    ) -> Self {
        Self {
            boundary,
            store,
            reconciler: None,
            verifier,
            signer,
            config,
        }
    }

    /// Attach the reconciler used by `await_reconciliation`.
    pub fn with_reconciler(mut self, reconciler: Arc<Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn verifier(&self) -> &EnvelopeVerifier {
        &self.verifier
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // =========================================================================
    // Replica access
    // =========================================================================

    async fn query(&self, query: &Query) -> Result<QueryResult, LedgerError> {
        let bytes = encode(query).map_err(|e| LedgerError::Internal(e.to_string()))?;
        let reply = self.boundary.submit_unordered(bytes).await?;
        decode(&reply).map_err(|e| LedgerError::Internal(format!("undecodable query result: {e}")))
    }

    async fn keys_of(&self, id: &ContractId) -> Result<ContractKeys, LedgerError> {
        match self.query(&Query::ContractKeys(id.clone())).await? {
            QueryResult::ContractKeys(Some(keys)) => Ok(keys),
            QueryResult::ContractKeys(None) => Err(LedgerError::ContractDoesNotExist),
            other => Err(unexpected(other)),
        }
    }

    async fn submit(
        &self,
        command: Command,
        tracker: &mut RequestTracker,
    ) -> Result<CommandOutcome, LedgerError> {
        let kind = command.kind();
        let bytes = encode(&command).map_err(|e| LedgerError::Internal(e.to_string()))?;

        tracker.advance(RequestPhase::Submitted);
        let reply = self.boundary.submit_ordered(bytes).await?;
        tracker.advance(RequestPhase::Committed);

        let result: CommandResult = decode(&reply.payload)
            .map_err(|e| LedgerError::Internal(format!("undecodable command result: {e}")))?;
        info!(
            request = %tracker.id(),
            sequence = reply.sequence,
            kind,
            ok = result.is_ok(),
            "Command committed"
        );

        if self.config.await_reconciliation {
            self.await_reconciled(reply.sequence, tracker).await;
        }
        Ok(result?)
    }

    async fn await_reconciled(&self, sequence: Sequence, tracker: &mut RequestTracker) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        match tokio::time::timeout(
            self.config.reconciliation_timeout,
            reconciler.wait_for(sequence),
        )
        .await
        {
            Ok(Ok(())) => tracker.advance(RequestPhase::Reconciled),
            Ok(Err(e)) => warn!(sequence, error = %e, "Read store will not catch up"),
            Err(_) => warn!(sequence, "Responding before the read store caught up"),
        }
    }

    // =========================================================================
    // Read store access
    // =========================================================================

    async fn read<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&dyn ReadStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| LedgerError::Internal(format!("read store task: {e}")))?
            .map_err(LedgerError::from)
    }

    // =========================================================================
    // Envelopes
    // =========================================================================

    fn rejected(&self, err: EnvelopeError) -> LedgerError {
        ledger_telemetry::record_envelope_rejection(err.label());
        warn!(reason = err.label(), error = %err, "Envelope rejected");
        err.into()
    }

    fn check<R: SignedRequest>(
        &self,
        request: &R,
        keys: &ContractKeys,
        tracker: &mut RequestTracker,
    ) -> Result<(), LedgerError> {
        self.verifier
            .verify(request, keys)
            .map_err(|e| self.rejected(e))?;
        tracker.advance(RequestPhase::Verified);
        Ok(())
    }

    fn seal<T: Canonical>(&self, body: T, keys: &ContractKeys) -> Result<Signed<T>, LedgerError> {
        Ok(self.signer.seal(body, keys.shared_secret.as_deref())?)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    async fn create_contract_inner(
        &self,
        request: CreateContractRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<CreateContractResponse>, LedgerError> {
        if request.public_key.is_empty() {
            return Err(LedgerError::InvalidRequest("public key is empty".into()));
        }
        if request.shared_secret.as_ref().is_some_and(Vec::is_empty) {
            return Err(LedgerError::InvalidRequest("shared secret is empty".into()));
        }
        // No record exists yet: the request vouches for its own keys.
        let keys = ContractKeys {
            public_key: request.public_key.clone(),
            shared_secret: request.shared_secret.clone(),
        };
        self.check(&request, &keys, tracker)?;

        let outcome = self
            .submit(
                Command::CreateContract {
                    id: request.contract,
                    public_key: request.public_key,
                    shared_secret: request.shared_secret,
                },
                tracker,
            )
            .await?;
        let CommandOutcome::Created { id } = outcome else {
            return Err(unexpected(outcome));
        };
        self.seal(
            CreateContractResponse {
                contract: id,
                service_public_key: self.signer.public_key(),
            },
            &keys,
        )
    }

    async fn load_money_inner(
        &self,
        request: LoadMoneyRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<LoadMoneyResponse>, LedgerError> {
        if request.amount <= 0 {
            return Err(LedgerError::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        let keys = self.keys_of(&request.contract).await?;
        self.check(&request, &keys, tracker)?;

        let outcome = self
            .submit(
                Command::LoadMoney {
                    id: request.contract,
                    amount: request.amount,
                },
                tracker,
            )
            .await?;
        let CommandOutcome::Loaded { id, balance } = outcome else {
            return Err(unexpected(outcome));
        };
        self.seal(
            LoadMoneyResponse {
                contract: id,
                balance,
            },
            &keys,
        )
    }

    async fn send_transaction_inner(
        &self,
        request: SendTransactionRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<SendTransactionResponse>, LedgerError> {
        if request.amount <= 0 {
            return Err(LedgerError::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if request.nonce.is_empty() {
            return Err(LedgerError::InvalidRequest("nonce is empty".into()));
        }
        let keys = self.keys_of(&request.origin).await?;
        self.check(&request, &keys, tracker)?;

        let outcome = self
            .submit(
                Command::SendTransaction {
                    origin: request.origin,
                    destination: request.destination,
                    amount: request.amount,
                },
                tracker,
            )
            .await?;
        let CommandOutcome::Transferred {
            origin,
            destination,
            ..
        } = outcome
        else {
            return Err(unexpected(outcome));
        };
        self.seal(
            SendTransactionResponse {
                origin,
                destination,
                amount: request.amount,
                nonce: request.nonce,
            },
            &keys,
        )
    }

    async fn get_balance_inner(
        &self,
        request: ContractQueryRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<BalanceResponse>, LedgerError> {
        let keys = self.keys_of(&request.contract).await?;
        self.check(&request, &keys, tracker)?;

        let balance = match self.query(&Query::Balance(request.contract.clone())).await? {
            QueryResult::Balance(Some(balance)) => balance,
            QueryResult::Balance(None) => return Err(LedgerError::ContractDoesNotExist),
            other => return Err(unexpected(other)),
        };
        self.seal(
            BalanceResponse {
                contract: request.contract,
                balance,
            },
            &keys,
        )
    }

    async fn get_extract_inner(
        &self,
        request: ContractQueryRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<ExtractResponse>, LedgerError> {
        let keys = self.keys_of(&request.contract).await?;
        self.check(&request, &keys, tracker)?;

        let id = request.contract.clone();
        let entries = self
            .read(move |store| store.audit_for(&id))
            .await?
            .iter()
            .map(ToString::to_string)
            .collect();
        self.seal(
            ExtractResponse {
                contract: request.contract,
                entries,
            },
            &keys,
        )
    }

    async fn get_total_value_inner(
        &self,
        request: TotalValueRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<TotalValueResponse>, LedgerError> {
        let Some(first) = request.first() else {
            return Err(LedgerError::InvalidRequest("no contracts listed".into()));
        };
        let keys = self.keys_of(first).await?;

        let canonical = request.canonical_bytes();
        self.verifier
            .verify_parts(
                EnvelopeParts {
                    canonical: &canonical,
                    signature: &request.signature,
                    mac: request.mac.as_deref(),
                    nonce: None,
                },
                &keys,
            )
            .map_err(|e| self.rejected(e))?;
        tracker.advance(RequestPhase::Verified);

        match self.query(&Query::SumOf(request.contracts.clone())).await? {
            QueryResult::Sum { missing, .. } if missing.is_empty() => {}
            QueryResult::Sum { missing, .. } => {
                warn!(missing = missing.len(), "Total value over unknown contracts");
                return Err(LedgerError::ContractDoesNotExist);
            }
            other => return Err(unexpected(other)),
        }

        let ids = request.contracts.clone();
        let total = self.read(move |store| store.sum_balances(&ids)).await?;
        self.seal(
            TotalValueResponse {
                contracts: request.contracts,
                total,
            },
            &keys,
        )
    }

    async fn get_global_ledger_value_inner(
        &self,
        request: ContractQueryRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<GlobalValueResponse>, LedgerError> {
        let keys = self.keys_of(&request.contract).await?;
        self.check(&request, &keys, tracker)?;

        let total = self.read(|store| store.sum_all()).await?;
        self.seal(
            GlobalValueResponse {
                contract: request.contract,
                total,
            },
            &keys,
        )
    }

    async fn get_ledger_inner(
        &self,
        request: ContractQueryRequest,
        tracker: &mut RequestTracker,
    ) -> Result<Signed<LedgerResponse>, LedgerError> {
        let keys = self.keys_of(&request.contract).await?;
        self.check(&request, &keys, tracker)?;

        let rows = self
            .read(|store| store.list_all())
            .await?
            .into_iter()
            .map(|(id, record)| {
                format!("{}:{}:{}", id, record.balance, BASE64.encode(&record.public_key))
            })
            .collect();
        self.seal(
            LedgerResponse {
                contract: request.contract,
                rows,
            },
            &keys,
        )
    }
}

/// Run `$body` under a tracker for `$method` and close the lifecycle.
macro_rules! tracked {
    ($method:literal, |$tracker:ident| $body:expr) => {{
        let mut $tracker = RequestTracker::start($method);
        let result = $body.await;
        $tracker.finish(&result);
        result
    }};
}

#[async_trait]
impl LedgerApi for LedgerService {
    async fn create_contract(
        &self,
        request: CreateContractRequest,
    ) -> Result<Signed<CreateContractResponse>, LedgerError> {
        tracked!("createContract", |tracker| self
            .create_contract_inner(request, &mut tracker))
    }

    async fn load_money(
        &self,
        request: LoadMoneyRequest,
    ) -> Result<Signed<LoadMoneyResponse>, LedgerError> {
        tracked!("loadMoney", |tracker| self.load_money_inner(request, &mut tracker))
    }

    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<Signed<SendTransactionResponse>, LedgerError> {
        tracked!("sendTransaction", |tracker| self
            .send_transaction_inner(request, &mut tracker))
    }

    async fn get_balance(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<BalanceResponse>, LedgerError> {
        tracked!("getBalance", |tracker| self.get_balance_inner(request, &mut tracker))
    }

    async fn get_extract(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<ExtractResponse>, LedgerError> {
        tracked!("getExtract", |tracker| self.get_extract_inner(request, &mut tracker))
    }

    async fn get_total_value(
        &self,
        request: TotalValueRequest,
    ) -> Result<Signed<TotalValueResponse>, LedgerError> {
        tracked!("getTotalValue", |tracker| self
            .get_total_value_inner(request, &mut tracker))
    }

    async fn get_global_ledger_value(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<GlobalValueResponse>, LedgerError> {
        tracked!("getGlobalLedgerValue", |tracker| self
            .get_global_ledger_value_inner(request, &mut tracker))
    }

    async fn get_ledger(
        &self,
        request: ContractQueryRequest,
    ) -> Result<Signed<LedgerResponse>, LedgerError> {
        tracked!("getLedger", |tracker| self.get_ledger_inner(request, &mut tracker))
    }

    fn service_public_key(&self) -> PublicKeyResponse {
        PublicKeyResponse {
            public_key: self.signer.public_key(),
        }
    }
}
