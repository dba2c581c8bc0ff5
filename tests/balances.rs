use pi_token_fabric::{
    list_balances, Amount, BalanceLine, Error, KeyPair, MockLedgerClient, Network,
};

#[tokio::test]
async fn test_list_balances_in_ledger_order() {
    let holder = KeyPair::from_seed_bytes([7; 32]).public_key();
    let ledger = MockLedgerClient::new(Network::Testnet)
        .with_account(holder, Amount::from_whole(42))
        .with_liquidity_pool_shares(holder, "pool-1", "0.5".parse().unwrap());

    let lines: Vec<BalanceLine> = list_balances(&ledger, &holder).await.unwrap().collect();

    assert_eq!(
        lines,
        vec![
            BalanceLine::LiquidityPoolShares {
                pool_id: "pool-1".to_string(),
                shares: "0.5".parse().unwrap(),
            },
            BalanceLine::Native {
                balance: Amount::from_whole(42),
            },
        ]
    );
    assert_eq!(ledger.load_account_calls(), 1);
}

#[tokio::test]
async fn test_balances_are_single_pass() {
    let holder = KeyPair::from_seed_bytes([7; 32]).public_key();
    let ledger = MockLedgerClient::new(Network::Testnet)
        .with_account(holder, Amount::from_whole(1));

    let mut balances = list_balances(&ledger, &holder).await.unwrap();
    assert!(balances.next().is_some());
    assert!(balances.next().is_none());
    assert!(balances.next().is_none());
}

#[tokio::test]
async fn test_unknown_account_aborts_listing() {
    let holder = KeyPair::from_seed_bytes([7; 32]).public_key();
    let ledger = MockLedgerClient::new(Network::Testnet);

    let err = list_balances(&ledger, &holder).await.unwrap_err();

    match err {
        Error::AccountLookup { account, source } => {
            assert_eq!(account, holder.address());
            assert!(source.is_account_not_found());
        }
        other => panic!("expected account lookup failure, got {other:?}"),
    }
}
