//! Issue Token Example
//!
//! Issues a new token on Pi Network in two transactions:
//! 1. The distributor trusts the token up to the limit
//! 2. The issuer authorizes the trustline and pays the initial supply
//!
//! Environment (a `.env` file is read if present):
//!   ISSUER_SECRET        secret seed of the issuing account
//!   DISTRIBUTOR_SECRET   secret seed of the receiving account
//!   PI_NETWORK           "Pi Network" or "Pi Testnet" (default: "Pi Testnet")
//!
//! Usage:
//!   cargo run --example issue_token -- <ASSET_CODE> <AMOUNT> <LIMIT>
//!   cargo run --example issue_token -- TEST 100 1000

use std::env;

use pi_token_fabric::{Amount, IssuanceRequest, Network, TokenIssuer};
use secrecy::Secret;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let asset_code = args.get(1).map_or("TEST", String::as_str);
    let amount: Amount = args.get(2).map_or("100", String::as_str).parse()?;
    let limit: Amount = args.get(3).map_or("1000", String::as_str).parse()?;
    let network: Network = env::var("PI_NETWORK")
        .unwrap_or_else(|_| "Pi Testnet".to_string())
        .parse()?;

    let request = IssuanceRequest::new(
        asset_code,
        amount,
        limit,
        Secret::new(env::var("ISSUER_SECRET").unwrap_or_default()),
        Secret::new(env::var("DISTRIBUTOR_SECRET").unwrap_or_default()),
        network,
    )?;

    println!("=== Issue {} on {} ===\n", asset_code, network);

    let issuer = TokenIssuer::for_network(network)?;
    match issuer.issue_token(&request).await {
        Ok(receipt) => {
            println!(
                "✓ Trust transaction: {} (ledger {})",
                receipt.trust.hash, receipt.trust.ledger
            );
            println!(
                "✓ Issue transaction: {} (ledger {})",
                receipt.issue.hash, receipt.issue.ledger
            );
            println!("\nDistributor balances:");
            issuer.describe(&request).await?;
        }
        Err(e) => {
            println!("✗ Issuance failed: {e}");
            if let Some(rejection) = e.rejection() {
                if rejection.is_bad_sequence() || rejection.is_expired() {
                    println!("  Rerun to rebuild the transaction with fresh sequence numbers.");
                }
            }
            return Err(e.into());
        }
    }

    Ok(())
}
