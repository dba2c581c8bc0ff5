//! Network selection.
//!
//! Pi Network runs two ledgers. Each is identified by a passphrase that is
//! mixed into every transaction hash, and each is served by its own Horizon
//! instance.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::client::ConfigError;

pub const MAINNET_PASSPHRASE: &str = "Pi Network";
pub const TESTNET_PASSPHRASE: &str = "Pi Testnet";

pub const MAINNET_HORIZON_URL: &str = "https://api.mainnet.minepi.com";
pub const TESTNET_HORIZON_URL: &str = "https://api.testnet.minepi.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_PASSPHRASE,
            Network::Testnet => TESTNET_PASSPHRASE,
        }
    }

    pub fn horizon_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_HORIZON_URL,
            Network::Testnet => TESTNET_HORIZON_URL,
        }
    }

    /// Name of the environment variable that overrides [`Network::horizon_url`].
    pub fn horizon_url_env_var(&self) -> &'static str {
        match self {
            Network::Mainnet => "PI_MAINNET_HORIZON_URL",
            Network::Testnet => "PI_TESTNET_HORIZON_URL",
        }
    }

    /// SHA-256 of the passphrase, prepended to every signature payload.
    pub fn network_id(&self) -> [u8; 32] {
        Sha256::digest(self.passphrase().as_bytes()).into()
    }

    /// Lenient routing from a free-form identifier.
    ///
    /// Only the exact mainnet passphrase selects [`Network::Mainnet`]; every
    /// other string, including `"pi Network"`, falls through to
    /// [`Network::Testnet`]. Use [`str::parse`] to reject unknown identifiers.
    pub fn route(identifier: &str) -> Self {
        if identifier == MAINNET_PASSPHRASE {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }
}

/// Strict parsing: only the two exact passphrases are accepted.
impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MAINNET_PASSPHRASE => Ok(Network::Mainnet),
            TESTNET_PASSPHRASE => Ok(Network::Testnet),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.passphrase())
    }
}
