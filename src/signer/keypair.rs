use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use stellar_xdr::curr as xdr;
use zeroize::Zeroize;

use super::{SeedError, Signer};
use crate::client::ConfigError;

/// First character of every encoded secret seed.
pub const SECRET_SEED_PREFIX: char = 'S';

/// Length of a strkey-encoded ed25519 secret seed.
pub const SECRET_SEED_LENGTH: usize = 56;

/// Checks that `seed` is a well-formed ed25519 secret seed.
///
/// The checks run in a fixed order and stop at the first failure:
/// 1. the seed is not empty
/// 2. it starts with [`SECRET_SEED_PREFIX`]
/// 3. it is exactly [`SECRET_SEED_LENGTH`] characters long
/// 4. it decodes as a strkey secret seed (version byte and CRC16 checksum)
///
/// # Errors
///
/// Returns the [`SeedError`] for the first check that fails.
pub fn validate_secret_seed(seed: &str) -> Result<(), SeedError> {
    let Some(first) = seed.chars().next() else {
        return Err(SeedError::MissingSeed);
    };
    if first != SECRET_SEED_PREFIX {
        return Err(SeedError::BadPrefix { found: first });
    }
    let length = seed.chars().count();
    if length != SECRET_SEED_LENGTH {
        return Err(SeedError::BadLength { length });
    }
    let mut decoded = stellar_strkey::ed25519::PrivateKey::from_string(seed)
        .map_err(|e| SeedError::InvalidChecksum(e.to_string()))?;
    decoded.0.zeroize();
    Ok(())
}

/// Ed25519 account key, rendered as a `G...` address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a `G...` account address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPublicKey`] if the address does not decode.
    pub fn from_address(address: &str) -> Result<Self, ConfigError> {
        stellar_strkey::ed25519::PublicKey::from_string(address)
            .map(|key| Self(key.0))
            .map_err(|e| ConfigError::InvalidPublicKey(format!("{address}: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn address(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.0).to_string()
    }

    /// Last four bytes of the key, used to tag decorated signatures.
    pub fn signature_hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.0[28..]);
        hint
    }

    /// Returns true if `signature` is a valid signature of `message` by this key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature);
        verifying_key.verify(message, &signature).is_ok()
    }

    pub(crate) fn to_xdr_account_id(self) -> xdr::AccountId {
        xdr::AccountId(xdr::PublicKey::PublicKeyTypeEd25519(xdr::Uint256(self.0)))
    }

    pub(crate) fn to_xdr_muxed_account(self) -> xdr::MuxedAccount {
        xdr::MuxedAccount::Ed25519(xdr::Uint256(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_address(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

/// Signing key derived from a secret seed.
///
/// Key material is wiped when the key pair is dropped. Instances are meant
/// to live for a single issuance call and are rebuilt from the seed each time.
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Validates `seed` and derives the key pair from it.
    ///
    /// # Errors
    ///
    /// Returns a [`SeedError`] if the seed fails [`validate_secret_seed`].
    pub fn from_secret(seed: &str) -> Result<Self, SeedError> {
        validate_secret_seed(seed)?;
        let mut decoded = stellar_strkey::ed25519::PrivateKey::from_string(seed)
            .map_err(|e| SeedError::InvalidChecksum(e.to_string()))?;
        let key_pair = Self::from_seed_bytes(decoded.0);
        decoded.0.zeroize();
        Ok(key_pair)
    }

    pub fn from_seed_bytes(seed: [u8; 32]) -> Self {
        let mut seed = seed;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        let public_key = PublicKey(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

impl Signer for KeyPair {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
