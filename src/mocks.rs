//! Canned Horizon responses for tests run against an [`httpmock::MockServer`].

use httpmock::prelude::*;
use serde_json::json;

pub fn mock_load_account(server: &MockServer, account_id: &str, sequence: i64) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/accounts/{account_id}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": account_id,
                "account_id": account_id,
                "sequence": sequence.to_string(),
                "subentry_count": 2,
                "last_modified_ledger": 7654321,
                "thresholds": {
                    "low_threshold": 0,
                    "med_threshold": 0,
                    "high_threshold": 0
                },
                "flags": {
                    "auth_required": false,
                    "auth_revocable": false,
                    "auth_immutable": false
                },
                "balances": [
                    {
                        "balance": "1000.0000000",
                        "limit": "1000.0000000",
                        "buying_liabilities": "0.0000000",
                        "selling_liabilities": "0.0000000",
                        "last_modified_ledger": 7654300,
                        "is_authorized": true,
                        "asset_type": "credit_alphanum4",
                        "asset_code": "TEST",
                        "asset_issuer": "GCFIRY65OQE7DFP5KLNS2PF2LVZMUZYJX4OZIEQ36N2IQANUB5XVYOJR"
                    },
                    {
                        "balance": "12.5000000",
                        "liquidity_pool_id": "dd7b1ab831c273310ddbec6f97870aa83c2fbd78ce22aded37ecbf4f3380fac7",
                        "limit": "922337203685.4775807",
                        "last_modified_ledger": 7654301,
                        "asset_type": "liquidity_pool_shares"
                    },
                    {
                        "balance": "99.9999800",
                        "buying_liabilities": "0.0000000",
                        "selling_liabilities": "0.0000000",
                        "asset_type": "native"
                    }
                ]
            }));
    });
}

pub fn mock_account_not_found(server: &MockServer, account_id: &str) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/accounts/{account_id}"));
        then.status(404)
            .header("content-type", "application/problem+json")
            .json_body(json!({
                "type": "https://stellar.org/horizon-errors/not_found",
                "title": "Resource Missing",
                "status": 404,
                "detail": "The resource at the url requested was not found."
            }));
    });
}

pub fn mock_fee_stats(server: &MockServer, base_fee: &str) {
    server.mock(|when, then| {
        when.method(GET).path("/fee_stats");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "last_ledger": "7654321",
                "last_ledger_base_fee": base_fee,
                "ledger_capacity_usage": "0.01",
                "fee_charged": {
                    "max": "100",
                    "min": "100",
                    "mode": "100",
                    "p50": "100",
                    "p99": "100"
                }
            }));
    });
}

pub fn mock_submit_success(server: &MockServer, hash: &str) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/transactions")
            .header("content-type", "application/x-www-form-urlencoded")
            .body_contains("tx=");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "hash": hash,
                "ledger": 7654322,
                "envelope_xdr": "AAAAAgAAAAA=",
                "result_xdr": "AAAAAAAAAGQAAAAAAAAAAQAAAAAAAAAGAAAAAAAAAAA=",
                "successful": true
            }));
    });
}

pub fn mock_submit_rejected(server: &MockServer, transaction_code: &str, operation_codes: &[&str]) {
    server.mock(|when, then| {
        when.method(POST).path("/transactions");
        then.status(400)
            .header("content-type", "application/problem+json")
            .json_body(json!({
                "type": "https://stellar.org/horizon-errors/transaction_failed",
                "title": "Transaction Failed",
                "status": 400,
                "detail": "The transaction failed when submitted to the stellar network.",
                "extras": {
                    "envelope_xdr": "AAAAAgAAAAA=",
                    "result_codes": {
                        "transaction": transaction_code,
                        "operations": operation_codes
                    },
                    "result_xdr": "AAAAAAAAAGT/////AAAAAQAAAAAAAAAB////+gAAAAA="
                }
            }));
    });
}
