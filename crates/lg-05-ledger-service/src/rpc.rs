//! JSON method dispatch over a [`LedgerApi`].
//!
//! One request per line: `{"id": .., "method": "loadMoney", "params": {..}}`.
//! The reply echoes `id` and carries either `result` or
//! `error: {code, message}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::LedgerError;
use tracing::debug;

use crate::ports::LedgerApi;

pub mod methods {
    pub const CREATE_CONTRACT: &str = "createContract";
    pub const LOAD_MONEY: &str = "loadMoney";
    pub const SEND_TRANSACTION: &str = "sendTransaction";
    pub const GET_BALANCE: &str = "getBalance";
    pub const GET_EXTRACT: &str = "getExtract";
    pub const GET_TOTAL_VALUE: &str = "getTotalValue";
    pub const GET_GLOBAL_LEDGER_VALUE: &str = "getGlobalLedgerValue";
    pub const GET_LEDGER: &str = "getLedger";
    pub const GET_PUBLIC_KEY: &str = "getPublicKey";

    pub const ALL: [&str; 9] = [
        CREATE_CONTRACT,
        LOAD_MONEY,
        SEND_TRANSACTION,
        GET_BALANCE,
        GET_EXTRACT,
        GET_TOTAL_VALUE,
        GET_GLOBAL_LEDGER_VALUE,
        GET_LEDGER,
        GET_PUBLIC_KEY,
    ];
}

/// Codes produced by the transport itself. Ledger failures use
/// [`LedgerError::code`].
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

impl RpcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(err: LedgerError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn from_outcome(id: Option<Value>, outcome: Result<Value, RpcError>) -> Self {
        match outcome {
            Ok(result) => Self {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::new(codes::INVALID_REQUEST, format!("{method}: {e}")))
}

fn to_json<T: Serialize>(value: Result<T, LedgerError>) -> Result<Value, RpcError> {
    let value = value?;
    serde_json::to_value(value).map_err(|e| RpcError::new(codes::INTERNAL, e.to_string()))
}

/// Route `method` to the matching ledger operation.
pub async fn dispatch(api: &dyn LedgerApi, method: &str, params: Value) -> Result<Value, RpcError> {
    debug!(method, "Dispatching");
    match method {
        methods::CREATE_CONTRACT => {
            to_json(api.create_contract(parse_params(method, params)?).await)
        }
        methods::LOAD_MONEY => to_json(api.load_money(parse_params(method, params)?).await),
        methods::SEND_TRANSACTION => {
            to_json(api.send_transaction(parse_params(method, params)?).await)
        }
        methods::GET_BALANCE => to_json(api.get_balance(parse_params(method, params)?).await),
        methods::GET_EXTRACT => to_json(api.get_extract(parse_params(method, params)?).await),
        methods::GET_TOTAL_VALUE => {
            to_json(api.get_total_value(parse_params(method, params)?).await)
        }
        methods::GET_GLOBAL_LEDGER_VALUE => {
            to_json(api.get_global_ledger_value(parse_params(method, params)?).await)
        }
        methods::GET_LEDGER => to_json(api.get_ledger(parse_params(method, params)?).await),
        methods::GET_PUBLIC_KEY => to_json(Ok(api.service_public_key())),
        _ => Err(RpcError::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )),
    }
}

/// Handle one request line and render the reply line (without newline).
pub async fn handle_line(api: &dyn LedgerApi, line: &str) -> String {
    let response = match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) => {
            let outcome = dispatch(api, &request.method, request.params).await;
            RpcResponse::from_outcome(request.id, outcome)
        }
        Err(e) => RpcResponse::from_outcome(
            None,
            Err(RpcError::new(codes::PARSE_ERROR, e.to_string())),
        ),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(r#"{{"id":null,"error":{{"code":"{}","message":"{}"}}}}"#, codes::INTERNAL, e)
    })
}
