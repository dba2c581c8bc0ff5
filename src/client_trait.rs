//! Trait for ledger client implementations
//!
//! The issuance orchestrator and the balance inspector only need three calls
//! from the ledger service. Both the production [`HorizonClient`] and the
//! in-memory [`MockLedgerClient`] implement this trait.
//!
//! [`HorizonClient`]: crate::client::HorizonClient
//! [`MockLedgerClient`]: crate::mock_client::MockLedgerClient

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::LedgerError;
use crate::model::{AccountResponse, TransactionReceipt};
use crate::signer::PublicKey;
use crate::transaction::SignedTransaction;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the current account snapshot (sequence number and balances).
    async fn load_account(&self, account_id: &PublicKey) -> Result<AccountResponse, LedgerError>;

    /// Fetch the network's current per-operation base fee, in stroops.
    async fn fetch_base_fee(&self) -> Result<u32, LedgerError>;

    /// Submit a signed transaction once and wait for the ledger's verdict.
    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TransactionReceipt, LedgerError>;
}

#[async_trait]
impl<C: LedgerClient + ?Sized> LedgerClient for Arc<C> {
    async fn load_account(&self, account_id: &PublicKey) -> Result<AccountResponse, LedgerError> {
        (**self).load_account(account_id).await
    }

    async fn fetch_base_fee(&self) -> Result<u32, LedgerError> {
        (**self).fetch_base_fee().await
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).submit_transaction(transaction).await
    }
}
