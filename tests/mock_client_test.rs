//! Tests for MockLedgerClient

use chrono::{Duration, Utc};
use pi_token_fabric::model::TransactionRejection;
use pi_token_fabric::transaction::{Operation, TransactionBuilder};
use pi_token_fabric::{Amount, Asset, AssetCode, KeyPair, LedgerClient, MockLedgerClient, Network};

fn key(fill: u8) -> KeyPair {
    KeyPair::from_seed_bytes([fill; 32])
}

fn asset(issuer: &KeyPair) -> Asset {
    Asset::new(AssetCode::new("PIE").unwrap(), issuer.public_key())
}

#[tokio::test]
async fn test_accounts_start_with_distinct_sequences() {
    let first = key(1).public_key();
    let second = key(2).public_key();
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(first, Amount::from_whole(1))
        .with_account(second, Amount::from_whole(1));

    let a = client.load_account(&first).await.unwrap();
    let b = client.load_account(&second).await.unwrap();
    assert_ne!(a.sequence, b.sequence);
    assert_eq!(a.account_id, first.address());
    assert_eq!(client.load_account_calls(), 2);
}

#[tokio::test]
async fn test_base_fee_is_configurable() {
    let client = MockLedgerClient::new(Network::Testnet).with_base_fee(321);
    assert_eq!(client.fetch_base_fee().await.unwrap(), 321);
    assert_eq!(client.fee_calls(), 1);
}

#[tokio::test]
async fn test_stale_sequence_rejected() {
    let holder = key(2);
    let issuer = key(1);
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(issuer.public_key(), Amount::from_whole(1))
        .with_account(holder.public_key(), Amount::from_whole(1));
    let sequence = client.sequence_of(&holder.public_key()).unwrap();

    let build = || {
        TransactionBuilder::new(holder.public_key(), sequence, 100)
            .add_operation(Operation::change_trust(asset(&issuer), Amount::from_whole(5)))
            .build()
            .unwrap()
            .sign(&holder, Network::Testnet)
            .unwrap()
    };

    client.submit_transaction(&build()).await.unwrap();
    // Replaying a transaction built from the same snapshot uses a spent sequence.
    let err = client.submit_transaction(&build()).await.unwrap_err();
    assert!(err.rejection().unwrap().is_bad_sequence());
    assert_eq!(client.submit_calls(), 2);
    assert_eq!(client.submitted_transactions().len(), 2);
}

#[tokio::test]
async fn test_expired_transaction_rejected() {
    let holder = key(2);
    let issuer = key(1);
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(issuer.public_key(), Amount::from_whole(1))
        .with_account(holder.public_key(), Amount::from_whole(1));
    let sequence = client.sequence_of(&holder.public_key()).unwrap();

    let transaction = TransactionBuilder::new(holder.public_key(), sequence, 100)
        .add_operation(Operation::change_trust(asset(&issuer), Amount::from_whole(5)))
        .build_at(Utc::now() - Duration::hours(1))
        .unwrap()
        .sign(&holder, Network::Testnet)
        .unwrap();

    let err = client.submit_transaction(&transaction).await.unwrap_err();
    assert!(err.rejection().unwrap().is_expired());
    assert_eq!(client.sequence_of(&holder.public_key()), Some(sequence));
}

#[tokio::test]
async fn test_unsigned_by_source_rejected() {
    let holder = key(2);
    let issuer = key(1);
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(issuer.public_key(), Amount::from_whole(1))
        .with_account(holder.public_key(), Amount::from_whole(1));
    let sequence = client.sequence_of(&holder.public_key()).unwrap();

    // Signed by the issuer on behalf of the holder.
    let transaction = TransactionBuilder::new(holder.public_key(), sequence, 100)
        .add_operation(Operation::change_trust(asset(&issuer), Amount::from_whole(5)))
        .build()
        .unwrap()
        .sign(&issuer, Network::Testnet)
        .unwrap();

    let err = client.submit_transaction(&transaction).await.unwrap_err();
    assert_eq!(err.rejection().unwrap().transaction_code(), Some("tx_bad_auth"));
}

#[tokio::test]
async fn test_injected_rejection_leaves_ledger_untouched() {
    let holder = key(2);
    let issuer = key(1);
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(issuer.public_key(), Amount::from_whole(1))
        .with_account(holder.public_key(), Amount::from_whole(1))
        .reject_submit_at(
            1,
            TransactionRejection::failed("tx_failed", vec!["op_low_reserve".to_string()]),
        );
    let sequence = client.sequence_of(&holder.public_key()).unwrap();

    let transaction = TransactionBuilder::new(holder.public_key(), sequence, 100)
        .add_operation(Operation::change_trust(asset(&issuer), Amount::from_whole(5)))
        .build()
        .unwrap()
        .sign(&holder, Network::Testnet)
        .unwrap();

    let err = client.submit_transaction(&transaction).await.unwrap_err();
    assert_eq!(
        err.rejection().unwrap().result_codes().unwrap().operations,
        vec!["op_low_reserve"]
    );
    assert_eq!(client.sequence_of(&holder.public_key()), Some(sequence));
    assert_eq!(client.balance_of(&holder.public_key(), &asset(&issuer)), None);

    // The rejection is consumed: the same envelope goes through next time.
    client.submit_transaction(&transaction).await.unwrap();
    assert_eq!(
        client.balance_of(&holder.public_key(), &asset(&issuer)),
        Some(Amount::ZERO)
    );
}

#[tokio::test]
async fn test_transfer_between_holders() {
    let issuer = key(1);
    let alice = key(2);
    let bob = key(3);
    let client = MockLedgerClient::new(Network::Testnet)
        .with_account(issuer.public_key(), Amount::from_whole(10))
        .with_account(alice.public_key(), Amount::from_whole(10))
        .with_account(bob.public_key(), Amount::from_whole(10));
    let token = asset(&issuer);

    for holder in [&alice, &bob] {
        let sequence = client.sequence_of(&holder.public_key()).unwrap();
        let trust = TransactionBuilder::new(holder.public_key(), sequence, 100)
            .add_operation(Operation::change_trust(token.clone(), Amount::from_whole(50)))
            .build()
            .unwrap()
            .sign(holder, Network::Testnet)
            .unwrap();
        client.submit_transaction(&trust).await.unwrap();
    }

    let sequence = client.sequence_of(&issuer.public_key()).unwrap();
    let mint = TransactionBuilder::new(issuer.public_key(), sequence, 100)
        .add_operation(Operation::payment(
            alice.public_key(),
            token.clone(),
            Amount::from_whole(20),
        ))
        .build()
        .unwrap()
        .sign(&issuer, Network::Testnet)
        .unwrap();
    client.submit_transaction(&mint).await.unwrap();

    let sequence = client.sequence_of(&alice.public_key()).unwrap();
    let transfer = TransactionBuilder::new(alice.public_key(), sequence, 100)
        .add_operation(Operation::payment(
            bob.public_key(),
            token.clone(),
            Amount::from_whole(5),
        ))
        .build()
        .unwrap()
        .sign(&alice, Network::Testnet)
        .unwrap();
    client.submit_transaction(&transfer).await.unwrap();

    assert_eq!(client.balance_of(&alice.public_key(), &token), Some(Amount::from_whole(15)));
    assert_eq!(client.balance_of(&bob.public_key(), &token), Some(Amount::from_whole(5)));

    let sequence = client.sequence_of(&bob.public_key()).unwrap();
    let overdraw = TransactionBuilder::new(bob.public_key(), sequence, 100)
        .add_operation(Operation::payment(
            alice.public_key(),
            token.clone(),
            Amount::from_whole(6),
        ))
        .build()
        .unwrap()
        .sign(&bob, Network::Testnet)
        .unwrap();
    let err = client.submit_transaction(&overdraw).await.unwrap_err();
    assert_eq!(
        err.rejection().unwrap().result_codes().unwrap().operations,
        vec!["op_underfunded"]
    );
}
