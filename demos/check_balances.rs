//! Check Balances Example
//!
//! Lists every balance of an account: native Pi, issued assets and
//! liquidity pool shares.
//!
//! Usage:
//!   cargo run --example check_balances -- <G...ADDRESS> [NETWORK]
//!   cargo run --example check_balances -- GCATS5YOVB6ROX2WUNKGNQ2MP3GMXDMKSG2O4N5CLX3A6W4PZGZZI55U "Pi Network"

use std::env;

use pi_token_fabric::{check_balances, Network, PublicKey};

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
    let Some(address) = args.get(1) else {
        eprintln!("usage: check_balances <G...ADDRESS> [\"Pi Network\" | \"Pi Testnet\"]");
        std::process::exit(2);
    };
    let account: PublicKey = address.parse()?;
    let network: Network = args.get(2).map_or("Pi Testnet", String::as_str).parse()?;

    let lines = check_balances(network, &account).await?;
    if lines.is_empty() {
        println!("No balances for {account}");
    }

    Ok(())
}
