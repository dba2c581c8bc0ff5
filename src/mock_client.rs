//! Mock ledger client for testing
//!
//! [`MockLedgerClient`] implements [`LedgerClient`] over an in-memory ledger.
//! Submitted transactions are checked and applied the way the ledger would:
//! signatures, sequence numbers, time bounds, trustlines, authorization and
//! limits. Failed transactions still consume their sequence number and fee.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pi_token_fabric::asset::Amount;
//! use pi_token_fabric::mock_client::MockLedgerClient;
//! use pi_token_fabric::network::Network;
//! use pi_token_fabric::signer::KeyPair;
//! use pi_token_fabric::LedgerClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let distributor = KeyPair::from_seed_bytes([2; 32]).public_key();
//! let client = MockLedgerClient::new(Network::Testnet)
//!     .with_account(distributor, Amount::from_whole(50));
//!
//! let account = client.load_account(&distributor).await?;
//! assert_eq!(account.balances.len(), 1);
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;

use crate::asset::{Amount, Asset};
use crate::client::LedgerError;
use crate::client_trait::LedgerClient;
use crate::model::{AccountResponse, BalanceEntry, TransactionReceipt, TransactionRejection};
use crate::network::Network;
use crate::signer::PublicKey;
use crate::transaction::{Operation, SignedTransaction};

const SEQUENCE_SPACING: i64 = 1 << 32;
const FIRST_LEDGER: u32 = 1000;

/// In-memory ledger implementing [`LedgerClient`].
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the ledger through another.
#[derive(Debug, Clone)]
pub struct MockLedgerClient {
    inner: Arc<MockLedgerInner>,
}

#[derive(Debug)]
struct MockLedgerInner {
    network: Network,
    base_fee: AtomicU32,
    fee_stats_unavailable: AtomicBool,
    accounts: Mutex<BTreeMap<PublicKey, MockAccount>>,
    rejections: Mutex<HashMap<usize, TransactionRejection>>,
    submitted: Mutex<Vec<SignedTransaction>>,
    load_account_calls: AtomicUsize,
    fee_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    next_ledger: AtomicU32,
}

#[derive(Debug, Clone)]
struct MockAccount {
    sequence: i64,
    native: Amount,
    auth_required: bool,
    trustlines: Vec<Trustline>,
    pool_shares: Vec<(String, Amount)>,
}

#[derive(Debug, Clone)]
struct Trustline {
    asset: Asset,
    balance: Amount,
    limit: Amount,
    authorized: bool,
}

impl MockAccount {
    fn trustline(&self, asset: &Asset) -> Option<&Trustline> {
        self.trustlines.iter().find(|line| &line.asset == asset)
    }

    fn trustline_mut(&mut self, asset: &Asset) -> Option<&mut Trustline> {
        self.trustlines.iter_mut().find(|line| &line.asset == asset)
    }

    fn to_response(&self, account_id: &PublicKey) -> AccountResponse {
        let mut balances: Vec<BalanceEntry> = self
            .trustlines
            .iter()
            .map(|line| BalanceEntry {
                balance: line.balance,
                asset_type: line.asset.asset_type().to_string(),
                asset_code: Some(line.asset.code.to_string()),
                asset_issuer: Some(line.asset.issuer.address()),
                liquidity_pool_id: None,
                limit: Some(line.limit),
                is_authorized: Some(line.authorized),
            })
            .collect();
        balances.extend(
            self.pool_shares
                .iter()
                .map(|(pool_id, shares)| BalanceEntry {
                    balance: *shares,
                    asset_type: "liquidity_pool_shares".to_string(),
                    asset_code: None,
                    asset_issuer: None,
                    liquidity_pool_id: Some(pool_id.clone()),
                    limit: None,
                    is_authorized: None,
                }),
        );
        balances.push(BalanceEntry::native(self.native));

        AccountResponse {
            account_id: account_id.address(),
            sequence: self.sequence,
            balances,
        }
    }
}

impl MockLedgerClient {
    /// Creates an empty ledger for `network` with a base fee of 100 stroops.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            inner: Arc::new(MockLedgerInner {
                network,
                base_fee: AtomicU32::new(100),
                fee_stats_unavailable: AtomicBool::new(false),
                accounts: Mutex::new(BTreeMap::new()),
                rejections: Mutex::new(HashMap::new()),
                submitted: Mutex::new(Vec::new()),
                load_account_calls: AtomicUsize::new(0),
                fee_calls: AtomicUsize::new(0),
                submit_calls: AtomicUsize::new(0),
                next_ledger: AtomicU32::new(FIRST_LEDGER),
            }),
        }
    }

    /// Funds a new account with `native` Pi.
    #[must_use]
    pub fn with_account(self, account_id: PublicKey, native: Amount) -> Self {
        {
            let mut accounts = self.inner.accounts.lock().unwrap();
            let sequence = (accounts.len() as i64 + 1) * SEQUENCE_SPACING;
            accounts.insert(
                account_id,
                MockAccount {
                    sequence,
                    native,
                    auth_required: false,
                    trustlines: Vec::new(),
                    pool_shares: Vec::new(),
                },
            );
        }
        self
    }

    #[must_use]
    pub fn with_base_fee(self, base_fee: u32) -> Self {
        self.inner.base_fee.store(base_fee, Ordering::SeqCst);
        self
    }

    /// Makes fee stats requests fail with a 503.
    #[must_use]
    pub fn with_unavailable_fee_stats(self) -> Self {
        self.inner
            .fee_stats_unavailable
            .store(true, Ordering::SeqCst);
        self
    }

    /// New trustlines to assets issued by `issuer` start unauthorized.
    #[must_use]
    pub fn with_auth_required(self, issuer: PublicKey) -> Self {
        if let Some(account) = self.inner.accounts.lock().unwrap().get_mut(&issuer) {
            account.auth_required = true;
        }
        self
    }

    #[must_use]
    pub fn with_liquidity_pool_shares(
        self,
        account_id: PublicKey,
        pool_id: &str,
        shares: Amount,
    ) -> Self {
        if let Some(account) = self.inner.accounts.lock().unwrap().get_mut(&account_id) {
            account.pool_shares.push((pool_id.to_string(), shares));
        }
        self
    }

    /// Refuses the `ordinal`-th submission (1-based) with `rejection`,
    /// leaving the ledger untouched.
    #[must_use]
    pub fn reject_submit_at(self, ordinal: usize, rejection: TransactionRejection) -> Self {
        self.inner
            .rejections
            .lock()
            .unwrap()
            .insert(ordinal, rejection);
        self
    }

    pub fn network(&self) -> Network {
        self.inner.network
    }

    pub fn load_account_calls(&self) -> usize {
        self.inner.load_account_calls.load(Ordering::SeqCst)
    }

    pub fn fee_calls(&self) -> usize {
        self.inner.fee_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.inner.submit_calls.load(Ordering::SeqCst)
    }

    /// Every transaction passed to `submit_transaction`, accepted or not.
    pub fn submitted_transactions(&self) -> Vec<SignedTransaction> {
        self.inner.submitted.lock().unwrap().clone()
    }

    pub fn sequence_of(&self, account_id: &PublicKey) -> Option<i64> {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(account_id)
            .map(|account| account.sequence)
    }

    pub fn native_balance_of(&self, account_id: &PublicKey) -> Option<Amount> {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(account_id)
            .map(|account| account.native)
    }

    /// Trustline balance of `asset` held by `account_id`, if the trustline exists.
    pub fn balance_of(&self, account_id: &PublicKey, asset: &Asset) -> Option<Amount> {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(account_id)?
            .trustline(asset)
            .map(|line| line.balance)
    }

    pub fn is_authorized(&self, account_id: &PublicKey, asset: &Asset) -> Option<bool> {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(account_id)?
            .trustline(asset)
            .map(|line| line.authorized)
    }

    fn apply(&self, transaction: &SignedTransaction) -> Result<TransactionReceipt, LedgerError> {
        let source = transaction.source();
        let mut accounts = self.inner.accounts.lock().unwrap();

        let Some(account) = accounts.get(&source) else {
            return Err(rejected("tx_no_source_account", Vec::new()));
        };
        if transaction.network() != self.inner.network || !transaction.is_signed_by(&source) {
            return Err(rejected("tx_bad_auth", Vec::new()));
        }
        if transaction.sequence() != account.sequence + 1 {
            return Err(rejected("tx_bad_seq", Vec::new()));
        }
        let max_time = transaction.transaction().max_time();
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        if max_time != 0 && max_time < now {
            return Err(rejected("tx_too_late", Vec::new()));
        }
        let fee = Amount::from_stroops(i64::from(transaction.transaction().fee()))
            .expect("fee is non-negative");
        let Some(remaining) = account.native.checked_sub(fee) else {
            return Err(rejected("tx_insufficient_balance", Vec::new()));
        };

        // Sequence and fee are consumed whether or not the operations apply.
        let mut staged = accounts.clone();
        let outcome = apply_operations(&mut staged, &source, transaction.operations());
        if outcome.is_ok() {
            *accounts = staged;
        }
        if let Some(account) = accounts.get_mut(&source) {
            account.sequence = transaction.sequence();
            account.native = remaining;
        }
        outcome?;

        Ok(TransactionReceipt {
            hash: transaction.hash_hex(),
            ledger: self.inner.next_ledger.fetch_add(1, Ordering::SeqCst),
            envelope_xdr: transaction.envelope_xdr().to_string(),
            result_xdr: String::new(),
            successful: true,
        })
    }
}

fn rejected(transaction_code: &str, operation_codes: Vec<String>) -> LedgerError {
    LedgerError::rejected(TransactionRejection::failed(transaction_code, operation_codes))
}

/// Applies every operation or reports `tx_failed` with one code per operation.
fn apply_operations(
    accounts: &mut BTreeMap<PublicKey, MockAccount>,
    source: &PublicKey,
    operations: &[Operation],
) -> Result<(), LedgerError> {
    let mut codes = Vec::with_capacity(operations.len());
    let mut failed = false;
    for operation in operations {
        if failed {
            codes.push("op_success".to_string());
            continue;
        }
        match apply_operation(accounts, source, operation) {
            Ok(()) => codes.push("op_success".to_string()),
            Err(code) => {
                codes.push(code.to_string());
                failed = true;
            }
        }
    }
    if failed {
        Err(rejected("tx_failed", codes))
    } else {
        Ok(())
    }
}

fn apply_operation(
    accounts: &mut BTreeMap<PublicKey, MockAccount>,
    source: &PublicKey,
    operation: &Operation,
) -> Result<(), &'static str> {
    match operation {
        Operation::ChangeTrust { asset, limit } => {
            if &asset.issuer == source {
                return Err("op_malformed");
            }
            let auth_required = accounts
                .get(&asset.issuer)
                .ok_or("op_no_issuer")?
                .auth_required;
            let account = accounts.get_mut(source).ok_or("op_no_account")?;
            match account.trustline_mut(asset) {
                Some(line) if *limit < line.balance => return Err("op_invalid_limit"),
                Some(line) => line.limit = *limit,
                None => account.trustlines.push(Trustline {
                    asset: asset.clone(),
                    balance: Amount::ZERO,
                    limit: *limit,
                    authorized: !auth_required,
                }),
            }
            Ok(())
        }
        Operation::AllowTrust {
            trustor,
            asset_code,
            authorize,
        } => {
            let asset = Asset::new(asset_code.clone(), *source);
            let line = accounts
                .get_mut(trustor)
                .and_then(|account| account.trustline_mut(&asset))
                .ok_or("op_no_trust_line")?;
            line.authorized = *authorize;
            Ok(())
        }
        Operation::Payment {
            destination,
            asset,
            amount,
        } => {
            let issuer_auth_required = accounts
                .get(&asset.issuer)
                .map(|issuer| issuer.auth_required)
                .unwrap_or(false);

            if &asset.issuer != source {
                let line = accounts
                    .get_mut(source)
                    .and_then(|account| account.trustline_mut(asset))
                    .ok_or("op_src_no_trust")?;
                if issuer_auth_required && !line.authorized {
                    return Err("op_src_not_authorized");
                }
                line.balance = line.balance.checked_sub(*amount).ok_or("op_underfunded")?;
            }

            if &asset.issuer == destination {
                return Ok(());
            }
            let line = accounts
                .get_mut(destination)
                .ok_or("op_no_destination")?
                .trustline_mut(asset)
                .ok_or("op_no_trust")?;
            if issuer_auth_required && !line.authorized {
                return Err("op_not_authorized");
            }
            let credited = line
                .balance
                .checked_add(*amount)
                .filter(|credited| *credited <= line.limit)
                .ok_or("op_line_full")?;
            line.balance = credited;
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn load_account(&self, account_id: &PublicKey) -> Result<AccountResponse, LedgerError> {
        self.inner.load_account_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(account_id)
            .map(|account| account.to_response(account_id))
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.address()))
    }

    async fn fetch_base_fee(&self) -> Result<u32, LedgerError> {
        self.inner.fee_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fee_stats_unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::RequestFailed {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error_text: "fee stats unavailable".to_string(),
            });
        }
        Ok(self.inner.base_fee.load(Ordering::SeqCst))
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        let ordinal = self.inner.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .submitted
            .lock()
            .unwrap()
            .push(transaction.clone());

        if let Some(rejection) = self.inner.rejections.lock().unwrap().remove(&ordinal) {
            return Err(LedgerError::rejected(rejection));
        }
        self.apply(transaction)
    }
}
