//! # Pi Token Fabric
//!
//! A Rust client for issuing custom tokens on Pi Network, a Stellar-compatible
//! ledger, and for inspecting account balances through its Horizon API.
//!
//! ## Modules
//!
//! - [`issuer`] - Two-phase token issuance (trust, then authorize and pay)
//! - [`balances`] - Read-only balance listing
//! - [`client`] - Horizon HTTP client, retry transport and error types
//! - [`transaction`] - Transaction building, hashing and signing
//! - [`signer`] - Secret seed validation and ed25519 key pairs
//! - [`network`] - Mainnet and testnet passphrases and endpoints
//! - [`asset`] - Asset codes, assets and fixed-point amounts
//! - [`model`] - Horizon request and response types
//! - [`mocks`] - httpmock fixtures for Horizon endpoints
//! - [`mock_client`] - In-memory ledger for integration testing
//!
//! ## Issuing a token
//!
//! ```rust,no_run
//! use pi_token_fabric::{issue_token, Amount, IssuanceRequest, Network};
//! use secrecy::Secret;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = IssuanceRequest::new(
//!     "TEST",
//!     "100".parse::<Amount>()?,
//!     "1000".parse::<Amount>()?,
//!     Secret::new(std::env::var("ISSUER_SECRET")?),
//!     Secret::new(std::env::var("DISTRIBUTOR_SECRET")?),
//!     Network::Testnet,
//! )?;
//! let receipt = issue_token(&request).await?;
//! println!("issued in transaction {}", receipt.issue.hash);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key material
//!
//! Secret seeds are passed as [`secrecy::Secret`] and never logged. Derived
//! signing keys are zeroized when dropped.

pub mod asset;
pub mod balances;
pub mod client;
pub mod client_trait;
pub mod issuer;
pub mod mock_client;
pub mod mocks;
pub mod model;
pub mod network;
pub mod signer;
pub mod transaction;

pub use asset::{Amount, Asset, AssetCode};
pub use balances::{check_balances, list_balances, BalanceLine, Balances};
pub use client::{ConfigError, Error, HorizonClient, LedgerError, RetryConfig};
pub use client_trait::LedgerClient;
pub use issuer::{
    issue_token, IssuanceObserver, IssuanceReceipt, IssuanceRequest, SilentObserver, TokenInfo,
    TokenIssuer, TracingObserver,
};
pub use mock_client::MockLedgerClient;
pub use network::Network;
pub use signer::{validate_secret_seed, KeyPair, PublicKey, SeedError, Signer};
