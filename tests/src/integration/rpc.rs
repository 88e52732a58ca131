//! # JSON Dispatch
//!
//! Requests built by a client, serialized to JSON, dispatched by method
//! name and answered with sealed JSON.

#[cfg(test)]
mod tests {
    use lg_02_envelope::{BalanceResponse, LoadMoneyResponse, Signed, VerificationPolicy};
    use lg_05_ledger_service::{dispatch, handle_line, LedgerApi, RpcResponse};
    use serde_json::{json, Value};

    use crate::fixtures::TestLedger;

    #[tokio::test]
    async fn test_json_round_trip() {
        let ledger = TestLedger::start(4, VerificationPolicy::hmac_augmented());
        let api = ledger.service.as_ref();
        let owner = ledger.client("c1", true);

        let params = serde_json::to_value(owner.create_contract()).unwrap();
        let created = dispatch(api, "createContract", params).await.unwrap();
        assert!(created["servicePublicKey"].is_string());

        let params = serde_json::to_value(owner.load_money(70)).unwrap();
        let loaded: Signed<LoadMoneyResponse> =
            serde_json::from_value(dispatch(api, "loadMoney", params).await.unwrap()).unwrap();
        owner.verify_response(&loaded).unwrap();
        assert_eq!(loaded.body.balance, 70);

        let params = serde_json::to_value(owner.balance()).unwrap();
        let balance: Signed<BalanceResponse> =
            serde_json::from_value(dispatch(api, "getBalance", params).await.unwrap()).unwrap();
        owner.verify_response(&balance).unwrap();
        assert_eq!(balance.body.balance, 70);
    }

    #[tokio::test]
    async fn test_json_errors_use_stable_codes() {
        let ledger = TestLedger::start(4, VerificationPolicy::signature_only());
        let api = ledger.service.as_ref();
        let owner = ledger.client("c1", false);
        ledger.open_account(&owner, 10).await;

        // Amount edited after signing.
        let mut params = serde_json::to_value(owner.load_money(5)).unwrap();
        params["amount"] = json!(500);
        let err = dispatch(api, "loadMoney", params).await.unwrap_err();
        assert_eq!(err.code, "AUTHENTICATION_FAILURE");

        let err = dispatch(api, "getBalance", json!({"contract": "%%%", "signature": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let stranger = ledger.client("c9", false);
        let params = serde_json::to_value(stranger.contract_query()).unwrap();
        let err = dispatch(api, "getExtract", params).await.unwrap_err();
        assert_eq!(err.code, "CONTRACT_DOES_NOT_EXIST");
    }

    #[tokio::test]
    async fn test_request_lines() {
        let ledger = TestLedger::start(1, VerificationPolicy::signature_only());
        let api = ledger.service.as_ref();

        let line = handle_line(api, r#"{"id":"a","method":"getPublicKey"}"#).await;
        let reply: RpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(reply.id, Some(Value::from("a")));
        let key = reply.result.unwrap();
        assert_eq!(
            key["publicKey"],
            json!(serde_json::to_value(ledger.service.service_public_key()).unwrap()["publicKey"])
        );

        let line = handle_line(api, r#"{"id":"b","method":"getLedger","params":{}}"#).await;
        let reply: RpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(reply.error.unwrap().code, "INVALID_REQUEST");
    }
}
