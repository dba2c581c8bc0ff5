//! Account balance inspection.

use std::fmt;
use std::vec;

use crate::asset::Amount;
use crate::client::{Error, HorizonClient};
use crate::client_trait::LedgerClient;
use crate::model::BalanceEntry;
use crate::network::Network;
use crate::signer::PublicKey;

/// One holding of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceLine {
    Native {
        balance: Amount,
    },
    Asset {
        code: String,
        issuer: String,
        balance: Amount,
        limit: Option<Amount>,
    },
    LiquidityPoolShares {
        pool_id: String,
        shares: Amount,
    },
}

impl BalanceLine {
    /// Classifies a raw Horizon balance entry. Returns `None` for asset types
    /// this crate does not know about.
    pub fn from_entry(entry: BalanceEntry) -> Option<Self> {
        match entry.asset_type.as_str() {
            "native" => Some(BalanceLine::Native {
                balance: entry.balance,
            }),
            "credit_alphanum4" | "credit_alphanum12" => Some(BalanceLine::Asset {
                code: entry.asset_code?,
                issuer: entry.asset_issuer?,
                balance: entry.balance,
                limit: entry.limit,
            }),
            "liquidity_pool_shares" => Some(BalanceLine::LiquidityPoolShares {
                pool_id: entry.liquidity_pool_id?,
                shares: entry.balance,
            }),
            other => {
                tracing::debug!("Skipping balance of unknown asset type {}", other);
                None
            }
        }
    }

    pub fn balance(&self) -> Amount {
        match self {
            BalanceLine::Native { balance } | BalanceLine::Asset { balance, .. } => *balance,
            BalanceLine::LiquidityPoolShares { shares, .. } => *shares,
        }
    }
}

impl fmt::Display for BalanceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceLine::Native { balance } => write!(f, "Pi (native): {balance}"),
            BalanceLine::Asset {
                code,
                issuer,
                balance,
                ..
            } => write!(f, "{code}: {balance} (issuer: {issuer})"),
            BalanceLine::LiquidityPoolShares { pool_id, shares } => {
                write!(f, "Liquidity Pool: {shares} shares (ID: {pool_id})")
            }
        }
    }
}

/// Single-pass iterator over an account's balance lines, in the order the
/// ledger reported them.
#[derive(Debug)]
pub struct Balances {
    entries: vec::IntoIter<BalanceEntry>,
}

impl Balances {
    pub fn new(entries: Vec<BalanceEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for Balances {
    type Item = BalanceLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.by_ref().find_map(BalanceLine::from_entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.entries.size_hint().1)
    }
}

/// Reads the balances of `account_id` in a single account lookup.
///
/// # Errors
///
/// Returns [`Error::AccountLookup`] if the account cannot be loaded,
/// including when it does not exist.
pub async fn list_balances<C>(client: &C, account_id: &PublicKey) -> Result<Balances, Error>
where
    C: LedgerClient + ?Sized,
{
    let account = client
        .load_account(account_id)
        .await
        .map_err(|source| Error::AccountLookup {
            account: account_id.address(),
            source,
        })?;
    Ok(Balances::new(account.balances))
}

/// Logs every balance of `account_id` on `network`, one line each.
///
/// # Errors
///
/// Returns [`Error::AccountLookup`] if the account cannot be loaded; the
/// failure is logged as well.
pub async fn check_balances(
    network: Network,
    account_id: &PublicKey,
) -> Result<Vec<BalanceLine>, Error> {
    let client = HorizonClient::for_network(network)?;
    let balances = list_balances(&client, account_id)
        .await
        .inspect_err(|e| tracing::error!("Error reading balances: {}", e))?;

    tracing::info!("Balances for {} on {}:", account_id, network);
    let lines: Vec<BalanceLine> = balances.collect();
    for line in &lines {
        tracing::info!("{}", line);
    }
    Ok(lines)
}
