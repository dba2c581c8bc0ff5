use std::env;
use std::sync::Arc;

use httpmock::prelude::*;
use pi_token_fabric::client::{LedgerError, RetryClient, RetryConfig, RetryError};
use pi_token_fabric::mocks;
use pi_token_fabric::transaction::{Operation, TransactionBuilder};
use pi_token_fabric::{
    check_balances, list_balances, Amount, Asset, AssetCode, BalanceLine, Error, HorizonClient,
    IssuanceRequest, KeyPair, LedgerClient, Network, SilentObserver, TokenIssuer,
};
use reqwest::Url;
use secrecy::Secret;
use serial_test::serial;

const ISSUER_SEED: &str = "SAAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQC5MY";
const ISSUER_ADDRESS: &str = "GCFIRY65OQE7DFP5KLNS2PF2LVZMUZYJX4OZIEQ36N2IQANUB5XVYOJR";
const DISTRIBUTOR_SEED: &str = "SABAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAEAQCAIBAFNE7";
const DISTRIBUTOR_ADDRESS: &str = "GCATS5YOVB6ROX2WUNKGNQ2MP3GMXDMKSG2O4N5CLX3A6W4PZGZZI55U";

fn horizon(server: &MockServer) -> HorizonClient {
    HorizonClient::with_config_and_base_url(
        RetryConfig::for_tests(),
        Url::parse(&server.base_url()).unwrap(),
    )
}

fn signed_trust_transaction() -> pi_token_fabric::transaction::SignedTransaction {
    let issuer = KeyPair::from_secret(ISSUER_SEED).unwrap();
    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap();
    let asset = Asset::new(AssetCode::new("TEST").unwrap(), issuer.public_key());
    TransactionBuilder::new(distributor.public_key(), 41, 100)
        .add_operation(Operation::change_trust(asset, Amount::from_whole(1000)))
        .build()
        .unwrap()
        .sign(&distributor, Network::Testnet)
        .unwrap()
}

#[test]
#[serial]
fn test_retry_config_from_env_defaults() {
    env::remove_var("HORIZON_RETRY_MAX_ATTEMPTS");
    env::remove_var("HORIZON_RETRY_BASE_DELAY_MS");
    env::remove_var("HORIZON_RETRY_MAX_DELAY_MS");
    env::remove_var("HORIZON_REQUEST_TIMEOUT_SECONDS");

    let config = RetryConfig::from_env().unwrap();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.base_delay_ms, 1000);
    assert_eq!(config.max_delay_ms, 30000);
    assert_eq!(config.timeout_seconds, 10);
}

#[test]
#[serial]
fn test_retry_config_from_env_custom_values() {
    env::set_var("HORIZON_RETRY_MAX_ATTEMPTS", "5");
    env::set_var("HORIZON_RETRY_BASE_DELAY_MS", "2000");
    env::set_var("HORIZON_RETRY_MAX_DELAY_MS", "60000");
    env::set_var("HORIZON_REQUEST_TIMEOUT_SECONDS", "30");

    let config = RetryConfig::from_env().unwrap();
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.base_delay_ms, 2000);
    assert_eq!(config.max_delay_ms, 60000);
    assert_eq!(config.timeout_seconds, 30);

    env::remove_var("HORIZON_RETRY_MAX_ATTEMPTS");
    env::remove_var("HORIZON_RETRY_BASE_DELAY_MS");
    env::remove_var("HORIZON_RETRY_MAX_DELAY_MS");
    env::remove_var("HORIZON_REQUEST_TIMEOUT_SECONDS");
}

#[test]
#[serial]
fn test_retry_config_from_env_invalid_values() {
    env::set_var("HORIZON_RETRY_MAX_ATTEMPTS", "invalid");
    let err = RetryConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("Invalid HORIZON_RETRY_MAX_ATTEMPTS"));
    env::remove_var("HORIZON_RETRY_MAX_ATTEMPTS");

    env::set_var("HORIZON_RETRY_MAX_DELAY_MS", "10");
    let err = RetryConfig::from_env().unwrap_err();
    assert!(matches!(err, Error::InvalidRetryConfig(_)));
    env::remove_var("HORIZON_RETRY_MAX_DELAY_MS");
}

#[test]
#[serial]
fn test_network_routing_selects_base_url() {
    env::remove_var("PI_MAINNET_HORIZON_URL");
    env::remove_var("PI_TESTNET_HORIZON_URL");

    let mainnet = HorizonClient::for_network(Network::route("Pi Network")).unwrap();
    assert_eq!(mainnet.base_url().as_str(), "https://api.mainnet.minepi.com/");

    // The lowercase spelling does not match the mainnet passphrase.
    let lowercase = HorizonClient::for_network(Network::route("pi network")).unwrap();
    assert_eq!(lowercase.base_url().as_str(), "https://api.testnet.minepi.com/");

    let other = HorizonClient::for_network(Network::route("Test Network")).unwrap();
    assert_eq!(other.base_url().as_str(), "https://api.testnet.minepi.com/");
}

#[test]
#[serial]
fn test_invalid_base_url_override() {
    env::set_var("PI_MAINNET_HORIZON_URL", "not a url");
    let err = HorizonClient::for_network(Network::Mainnet).unwrap_err();
    assert!(matches!(err, Error::UrlParse(_)));
    env::remove_var("PI_MAINNET_HORIZON_URL");
}

#[tokio::test]
async fn test_retry_client_retries_server_errors() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fee_stats");
        then.status(503);
    });

    let client = RetryClient::for_tests();
    let url = format!("{}/fee_stats", server.base_url());
    let err = client
        .execute_with_retry(|| client.client().get(&url))
        .await
        .unwrap_err();

    mock.assert_hits(2);
    match err {
        RetryError::Exhausted { attempts, last_error } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_client_rate_limited_on_last_attempt() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fee_stats");
        then.status(429).header("retry-after", "0");
    });

    let client = RetryClient::new(RetryConfig::for_tests().with_max_attempts(1));
    let url = format!("{}/fee_stats", server.base_url());
    let err = client
        .execute_with_retry(|| client.client().get(&url))
        .await
        .unwrap_err();

    mock.assert_hits(1);
    assert_eq!(err.retry_after_seconds(), Some(0));
}

#[tokio::test]
async fn test_retry_client_caps_huge_retry_after() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fee_stats");
        then.status(429).header("retry-after", "18446744073709552");
    });

    let client = RetryClient::for_tests();
    let url = format!("{}/fee_stats", server.base_url());
    let err = client
        .execute_with_retry(|| client.client().get(&url))
        .await
        .unwrap_err();

    // The wait between attempts is capped at max_delay_ms.
    mock.assert_hits(2);
    assert_eq!(err.retry_after_seconds(), Some(18_446_744_073_709_552));
}

#[tokio::test]
async fn test_connection_failure_surfaces_network_error() {
    let client = HorizonClient::with_config_and_base_url(
        RetryConfig::for_tests(),
        Url::parse("http://127.0.0.1:9").unwrap(),
    );
    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap().public_key();

    let err = client.load_account(&distributor).await.unwrap_err();
    match err {
        LedgerError::Network(e) => assert!(e.is_connect()),
        other => panic!("expected a network error, got {other:?}"),
    }

    let err = client.fetch_base_fee().await.unwrap_err();
    assert!(matches!(err, LedgerError::Network(_)));
}

#[tokio::test]
async fn test_retry_client_passes_client_errors_through() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/accounts/GMISSING");
        then.status(404);
    });

    let client = RetryClient::for_tests();
    let url = format!("{}/accounts/GMISSING", server.base_url());
    let response = client
        .execute_with_retry(|| client.client().get(&url))
        .await
        .unwrap();

    mock.assert_hits(1);
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_load_account() {
    let server = MockServer::start();
    mocks::mock_load_account(&server, DISTRIBUTOR_ADDRESS, 103_720_918_407_102_567);

    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap().public_key();
    let account = horizon(&server).load_account(&distributor).await.unwrap();

    assert_eq!(account.account_id, DISTRIBUTOR_ADDRESS);
    assert_eq!(account.sequence, 103_720_918_407_102_567);
    assert_eq!(account.balances.len(), 3);
    assert_eq!(account.balances[0].asset_code.as_deref(), Some("TEST"));
    assert_eq!(account.balances[0].limit, Some(Amount::from_whole(1000)));
}

#[tokio::test]
async fn test_load_unknown_account() {
    let server = MockServer::start();
    mocks::mock_account_not_found(&server, DISTRIBUTOR_ADDRESS);

    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap().public_key();
    let err = horizon(&server)
        .load_account(&distributor)
        .await
        .unwrap_err();

    assert!(err.is_account_not_found());
    assert_eq!(err.to_string(), format!("Account {DISTRIBUTOR_ADDRESS} not found"));
}

#[tokio::test]
async fn test_fetch_base_fee() {
    let server = MockServer::start();
    mocks::mock_fee_stats(&server, "250");

    assert_eq!(horizon(&server).fetch_base_fee().await.unwrap(), 250);
}

#[tokio::test]
async fn test_fetch_base_fee_falls_back() {
    let server = MockServer::start();
    mocks::mock_fee_stats(&server, "not-a-number");

    assert_eq!(horizon(&server).fetch_base_fee().await.unwrap(), 100);
}

#[tokio::test]
async fn test_submit_transaction_success() {
    let server = MockServer::start();
    let transaction = signed_trust_transaction();
    let hash = transaction.hash_hex();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/transactions")
            .x_www_form_urlencoded_tuple("tx", transaction.envelope_xdr());
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "hash": hash,
                "ledger": 42,
                "envelope_xdr": transaction.envelope_xdr(),
                "result_xdr": "AAAAAAAAAGQAAAAAAAAAAQAAAAAAAAAGAAAAAAAAAAA=",
                "successful": true
            }));
    });

    let receipt = horizon(&server)
        .submit_transaction(&transaction)
        .await
        .unwrap();

    mock.assert();
    assert_eq!(receipt.hash, transaction.hash_hex());
    assert_eq!(receipt.ledger, 42);
    assert!(receipt.successful);
}

#[tokio::test]
async fn test_submit_transaction_rejected() {
    let server = MockServer::start();
    mocks::mock_submit_rejected(&server, "tx_bad_seq", &[]);

    let err = horizon(&server)
        .submit_transaction(&signed_trust_transaction())
        .await
        .unwrap_err();

    let rejection = err.rejection().expect("rejection document");
    assert!(rejection.is_bad_sequence());
    assert_eq!(rejection.status, 400);
}

#[tokio::test]
async fn test_submit_is_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/transactions");
        then.status(504).body("gateway timeout");
    });

    let err = horizon(&server)
        .submit_transaction(&signed_trust_transaction())
        .await
        .unwrap_err();

    mock.assert_hits(1);
    match err {
        LedgerError::RequestFailed { status, error_text } => {
            assert_eq!(status.as_u16(), 504);
            assert_eq!(error_text, "gateway timeout");
        }
        other => panic!("expected request failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_balances_over_http() {
    let server = MockServer::start();
    mocks::mock_load_account(&server, DISTRIBUTOR_ADDRESS, 7);

    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap().public_key();
    let lines: Vec<BalanceLine> = list_balances(&horizon(&server), &distributor)
        .await
        .unwrap()
        .collect();

    let rendered: Vec<String> = lines.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            format!("TEST: 1000.0000000 (issuer: {ISSUER_ADDRESS})"),
            "Liquidity Pool: 12.5000000 shares (ID: dd7b1ab831c273310ddbec6f97870aa83c2fbd78ce22aded37ecbf4f3380fac7)".to_string(),
            "Pi (native): 99.9999800".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_issue_token_over_http() {
    let server = MockServer::start();
    mocks::mock_load_account(&server, DISTRIBUTOR_ADDRESS, 10);
    mocks::mock_load_account(&server, ISSUER_ADDRESS, 20);
    mocks::mock_fee_stats(&server, "100");
    let submit = server.mock(|when, then| {
        when.method(POST).path("/transactions");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "hash": "b9d0b2292c4e09e8eb22d036171491e87b8d2086bf8b265874c8d182cb9c9020",
                "ledger": 7654322,
                "envelope_xdr": "AAAAAgAAAAA=",
                "successful": true
            }));
    });

    let request = IssuanceRequest::new(
        "TEST",
        Amount::from_whole(100),
        Amount::from_whole(1000),
        Secret::new(ISSUER_SEED.to_string()),
        Secret::new(DISTRIBUTOR_SEED.to_string()),
        Network::Testnet,
    )
    .unwrap();

    let issuer = TokenIssuer::new(horizon(&server)).with_observer(Arc::new(SilentObserver));
    let receipt = issuer.issue_token(&request).await.unwrap();

    submit.assert_hits(2);
    assert_eq!(receipt.asset.to_string(), format!("TEST:{ISSUER_ADDRESS}"));
    assert_eq!(receipt.distributor.address(), DISTRIBUTOR_ADDRESS);
    assert_eq!(receipt.issue.ledger, 7654322);
    assert_eq!(receipt.issue.result_xdr, "");
}

#[tokio::test]
async fn test_submit_timeout_problem_is_not_a_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/transactions");
        then.status(504)
            .header("content-type", "application/problem+json")
            .json_body(serde_json::json!({
                "type": "https://stellar.org/horizon-errors/timeout",
                "title": "Timeout",
                "status": 504
            }));
    });

    let err = horizon(&server)
        .submit_transaction(&signed_trust_transaction())
        .await
        .unwrap_err();

    assert!(err.rejection().is_none());
    assert!(matches!(err, LedgerError::RequestFailed { .. }));
}

#[tokio::test]
async fn test_submit_fixture_receipt() {
    let server = MockServer::start();
    mocks::mock_submit_success(
        &server,
        "3389e9f0f1a65f19736cacf544c2e825313e8447f569233bb8db39aa607c8889",
    );

    let receipt = horizon(&server)
        .submit_transaction(&signed_trust_transaction())
        .await
        .unwrap();

    assert_eq!(
        receipt.hash,
        "3389e9f0f1a65f19736cacf544c2e825313e8447f569233bb8db39aa607c8889"
    );
    assert_eq!(receipt.ledger, 7654322);
    assert!(receipt.successful);
}

#[tokio::test]
#[serial]
async fn test_check_balances_uses_network_override() {
    let server = MockServer::start();
    mocks::mock_load_account(&server, DISTRIBUTOR_ADDRESS, 42);
    mocks::mock_account_not_found(&server, ISSUER_ADDRESS);
    env::set_var("PI_TESTNET_HORIZON_URL", server.base_url());

    let distributor = KeyPair::from_secret(DISTRIBUTOR_SEED).unwrap().public_key();
    let lines = check_balances(Network::Testnet, &distributor).await;

    let issuer = KeyPair::from_secret(ISSUER_SEED).unwrap().public_key();
    let missing = check_balances(Network::Testnet, &issuer).await;

    env::remove_var("PI_TESTNET_HORIZON_URL");

    let lines = lines.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0].to_string(),
        format!("TEST: 1000.0000000 (issuer: {ISSUER_ADDRESS})")
    );
    assert_eq!(lines[2].to_string(), "Pi (native): 99.9999800");

    match missing.unwrap_err() {
        Error::AccountLookup { account, source } => {
            assert_eq!(account, ISSUER_ADDRESS);
            assert!(source.is_account_not_found());
        }
        other => panic!("expected an account lookup error, got {other:?}"),
    }
}
