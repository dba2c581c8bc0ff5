use thiserror::Error;

/// Reasons a secret seed is rejected before key derivation.
///
/// Variants are listed in the order the checks run; validation stops at the
/// first failing check so the reported variant is always the most specific one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// The seed is empty.
    #[error("missing wallet private seed")]
    MissingSeed,

    /// The seed does not start with the secret-seed prefix character `S`.
    #[error("wallet private seed must start with 'S', found {found:?}")]
    BadPrefix { found: char },

    /// The seed is not exactly 56 characters long.
    #[error("wallet private seed must be 56 characters long, found {length}")]
    BadLength { length: usize },

    /// The strkey decoder rejected the seed (bad base32 or CRC16 checksum).
    #[error("invalid wallet private seed: {0}")]
    InvalidChecksum(String),
}

impl SeedError {
    /// Stable identifier for the failure, suitable for matching in logs.
    pub fn code(&self) -> &'static str {
        match self {
            SeedError::MissingSeed => "missing_wallet_private_seed",
            SeedError::BadPrefix { .. } => "wallet_private_seed_not_starts_with_S",
            SeedError::BadLength { .. } => "wallet_private_seed_not_56_chars_long",
            SeedError::InvalidChecksum(_) => "invalid_wallet_private_seed",
        }
    }
}
