use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::Amount;

/// Account snapshot returned by `GET /accounts/{account_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account_id: String,
    /// Sequence number of the last transaction the account submitted.
    #[serde(with = "string_i64")]
    pub sequence: i64,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
}

/// One entry of an account's `balances` array, as Horizon reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub balance: Amount,
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_authorized: Option<bool>,
}

impl BalanceEntry {
    pub fn native(balance: Amount) -> Self {
        Self {
            balance,
            asset_type: "native".to_string(),
            asset_code: None,
            asset_issuer: None,
            liquidity_pool_id: None,
            limit: None,
            is_authorized: None,
        }
    }
}

/// Subset of `GET /fee_stats` needed to price a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct FeeStats {
    pub last_ledger: Option<String>,
    pub last_ledger_base_fee: String,
}

/// Successful response of `POST /transactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: String,
    pub ledger: u32,
    pub envelope_xdr: String,
    #[serde(default)]
    pub result_xdr: String,
    #[serde(default = "default_successful")]
    pub successful: bool,
}

fn default_successful() -> bool {
    true
}

/// Result codes attached to a failed submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: String,
    #[serde(default)]
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemExtras {
    #[serde(default)]
    pub result_codes: Option<ResultCodes>,
    #[serde(default)]
    pub envelope_xdr: Option<String>,
    #[serde(default)]
    pub result_xdr: Option<String>,
}

/// Problem document Horizon returns when it refuses a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRejection {
    #[serde(rename = "type", default)]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub extras: Option<ProblemExtras>,
}

impl TransactionRejection {
    /// Builds a `transaction_failed` rejection carrying the given result codes.
    pub fn failed(transaction_code: &str, operation_codes: Vec<String>) -> Self {
        Self {
            problem_type: "https://stellar.org/horizon-errors/transaction_failed".to_string(),
            title: "Transaction Failed".to_string(),
            status: 400,
            detail: None,
            extras: Some(ProblemExtras {
                result_codes: Some(ResultCodes {
                    transaction: transaction_code.to_string(),
                    operations: operation_codes,
                }),
                envelope_xdr: None,
                result_xdr: None,
            }),
        }
    }

    pub fn result_codes(&self) -> Option<&ResultCodes> {
        self.extras.as_ref()?.result_codes.as_ref()
    }

    pub fn transaction_code(&self) -> Option<&str> {
        self.result_codes().map(|codes| codes.transaction.as_str())
    }

    /// The envelope was signed against a stale sequence number and must be
    /// rebuilt after reloading the account.
    pub fn is_bad_sequence(&self) -> bool {
        self.transaction_code() == Some("tx_bad_seq")
    }

    /// The envelope's time bounds expired before it was included.
    pub fn is_expired(&self) -> bool {
        self.transaction_code() == Some("tx_too_late")
    }
}

impl fmt::Display for TransactionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.title, self.status)?;
        if let Some(codes) = self.result_codes() {
            write!(f, ": {}", codes.transaction)?;
            if !codes.operations.is_empty() {
                write!(f, " [{}]", codes.operations.join(", "))?;
            }
        } else if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Horizon encodes 64-bit integers as JSON strings.
pub mod string_i64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
