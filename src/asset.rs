//! Asset identity and amounts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use stellar_xdr::curr as xdr;

use crate::client::ConfigError;
use crate::signer::PublicKey;

/// Longest asset code the ledger accepts.
pub const MAX_ASSET_CODE_LENGTH: usize = 12;

/// Ledger amounts are fixed point with seven decimal places.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

const DECIMAL_PLACES: usize = 7;

/// Asset code: 1 to 12 ASCII letters or digits.
///
/// Codes of up to four characters are encoded as `AlphaNum4`, longer codes as
/// `AlphaNum12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetCode(String);

impl AssetCode {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAssetCode`] if the code is empty, longer
    /// than twelve characters, or contains anything but ASCII alphanumerics.
    pub fn new(code: &str) -> Result<Self, ConfigError> {
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidAssetCode(format!(
                "{code:?} may only contain ASCII letters and digits"
            )));
        }
        // ASCII only from here, so the byte length is the character count.
        if code.is_empty() || code.len() > MAX_ASSET_CODE_LENGTH {
            return Err(ConfigError::InvalidAssetCode(format!(
                "{code:?} must be 1 to {MAX_ASSET_CODE_LENGTH} characters"
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_alphanum4(&self) -> bool {
        self.0.len() <= 4
    }

    pub(crate) fn to_xdr(&self) -> xdr::AssetCode {
        if self.is_alphanum4() {
            xdr::AssetCode::CreditAlphanum4(xdr::AssetCode4(self.padded()))
        } else {
            xdr::AssetCode::CreditAlphanum12(xdr::AssetCode12(self.padded()))
        }
    }

    fn padded<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        bytes[..self.0.len()].copy_from_slice(self.0.as_bytes());
        bytes
    }
}

impl FromStr for AssetCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AssetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-native asset, uniquely identified by its code and issuing account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    pub code: AssetCode,
    pub issuer: PublicKey,
}

impl Asset {
    pub fn new(code: AssetCode, issuer: PublicKey) -> Self {
        Self { code, issuer }
    }

    /// Horizon's `asset_type` label for this asset.
    pub fn asset_type(&self) -> &'static str {
        if self.code.is_alphanum4() {
            "credit_alphanum4"
        } else {
            "credit_alphanum12"
        }
    }

    pub(crate) fn to_xdr(&self) -> xdr::Asset {
        let issuer = self.issuer.to_xdr_account_id();
        match self.code.to_xdr() {
            xdr::AssetCode::CreditAlphanum4(asset_code) => {
                xdr::Asset::CreditAlphanum4(xdr::AlphaNum4 { asset_code, issuer })
            }
            xdr::AssetCode::CreditAlphanum12(asset_code) => {
                xdr::Asset::CreditAlphanum12(xdr::AlphaNum12 { asset_code, issuer })
            }
        }
    }

    pub(crate) fn to_xdr_change_trust(&self) -> xdr::ChangeTrustAsset {
        match self.to_xdr() {
            xdr::Asset::CreditAlphanum4(alpha) => xdr::ChangeTrustAsset::CreditAlphanum4(alpha),
            xdr::Asset::CreditAlphanum12(alpha) => xdr::ChangeTrustAsset::CreditAlphanum12(alpha),
            xdr::Asset::Native => xdr::ChangeTrustAsset::Native,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.issuer)
    }
}

/// Non-negative ledger amount, stored in stroops (1 unit = 10^7 stroops).
///
/// Parses from and renders to the decimal strings Horizon uses, e.g.
/// `"100"` or `"100.0000000"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAmount`] for negative values.
    pub fn from_stroops(stroops: i64) -> Result<Self, ConfigError> {
        if stroops < 0 {
            return Err(ConfigError::InvalidAmount(format!(
                "{stroops} stroops is negative"
            )));
        }
        Ok(Self(stroops))
    }

    pub fn from_whole(units: u32) -> Self {
        Self(i64::from(units) * STROOPS_PER_UNIT)
    }

    pub fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0
            .checked_sub(other.0)
            .filter(|stroops| *stroops >= 0)
            .map(Amount)
    }
}

impl FromStr for Amount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidAmount(format!("{s:?}: {reason}"));

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("empty amount"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected a non-negative decimal number"));
        }
        if fraction.len() > DECIMAL_PLACES {
            return Err(invalid("more than 7 decimal places"));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };
        let fraction: i64 = format!("{:0<width$}", fraction, width = DECIMAL_PLACES)
            .parse()
            .map_err(|_| invalid("invalid fractional part"))?;

        whole
            .checked_mul(STROOPS_PER_UNIT)
            .and_then(|stroops| stroops.checked_add(fraction))
            .map(Amount)
            .ok_or_else(|| invalid("amount too large"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:07}",
            self.0 / STROOPS_PER_UNIT,
            self.0 % STROOPS_PER_UNIT
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
