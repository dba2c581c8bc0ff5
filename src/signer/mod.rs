//! # Signer Module
//!
//! Key handling for the two accounts taking part in an issuance: the issuer,
//! which authorizes the trustline and mints the initial supply, and the
//! distributor, which opens the trustline and receives the supply.
//!
//! Secret seeds are strkey-encoded ed25519 seeds (`S...`, 56 characters).
//! They are validated with [`validate_secret_seed`] before any key is derived,
//! and the resulting [`KeyPair`] only lives for the duration of one call.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pi_token_fabric::signer::{KeyPair, Signer, SeedError};
//!
//! fn sign_example(seed: &str) -> Result<(), SeedError> {
//!     let key_pair = KeyPair::from_secret(seed)?;
//!     let signature = key_pair.sign(b"transaction hash");
//!     assert!(key_pair.public_key().verify(b"transaction hash", &signature));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod keypair;

pub use error::SeedError;
pub use keypair::{validate_secret_seed, KeyPair, PublicKey};

/// Trait for transaction signing implementations
///
/// A signer produces detached ed25519 signatures over a transaction hash.
/// [`KeyPair`] is the software implementation; other backends (hardware
/// wallets, remote signers) can plug in at the same seam.
pub trait Signer: Send + Sync {
    /// The account whose key produces the signatures.
    fn public_key(&self) -> PublicKey;

    /// Signs `message` and returns the raw 64-byte signature.
    fn sign(&self, message: &[u8]) -> [u8; 64];
}
