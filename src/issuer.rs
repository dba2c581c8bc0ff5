//! # Token issuance
//!
//! Issuing a new asset takes two ledger transactions, submitted in order:
//!
//! 1. **Trust**: the distributor opens a trustline for `code:issuer` up to
//!    `limit`, signed by the distributor.
//! 2. **Issue**: the issuer authorizes that trustline and pays `amount` of the
//!    asset to the distributor, both operations in one transaction signed by
//!    the issuer.
//!
//! The ledger will not credit an account that has no trustline for the asset,
//! and only the issuer can authorize the trustline, hence the split.
//!
//! The two steps are not atomic. If the issue transaction fails after the
//! trust transaction committed, the distributor is left with an empty
//! trustline. That state is valid and nothing is rolled back; running the
//! issuance again completes it. Each call reloads sequence numbers, so a
//! repeated call is a second, additive issuance.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};

use crate::asset::{Amount, Asset, AssetCode};
use crate::balances::{list_balances, BalanceLine};
use crate::client::{ConfigError, Error, HorizonClient};
use crate::client_trait::LedgerClient;
use crate::model::TransactionReceipt;
use crate::network::Network;
use crate::signer::{validate_secret_seed, KeyPair, PublicKey};
use crate::transaction::{Operation, TransactionBuilder, DEFAULT_TIMEOUT};

/// Validated input for one issuance.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    asset_code: AssetCode,
    amount: Amount,
    limit: Amount,
    issuer_secret: Secret<String>,
    distributor_secret: Secret<String>,
    network: Network,
    timeout: Duration,
}

impl IssuanceRequest {
    /// Validates every input before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking in order: amount
    /// against limit, positive amount and limit, asset code, issuer seed,
    /// distributor seed.
    pub fn new(
        asset_code: &str,
        amount: Amount,
        limit: Amount,
        issuer_secret: Secret<String>,
        distributor_secret: Secret<String>,
        network: Network,
    ) -> Result<Self, ConfigError> {
        if amount > limit {
            return Err(ConfigError::AmountExceedsLimit { amount, limit });
        }
        if amount.is_zero() {
            return Err(ConfigError::NonPositiveAmount { field: "amount" });
        }
        if limit.is_zero() {
            return Err(ConfigError::NonPositiveAmount { field: "limit" });
        }
        let asset_code = AssetCode::new(asset_code)?;
        validate_secret_seed(issuer_secret.expose_secret())
            .map_err(|e| ConfigError::seed("issuer", e))?;
        validate_secret_seed(distributor_secret.expose_secret())
            .map_err(|e| ConfigError::seed("distributor", e))?;

        Ok(Self {
            asset_code,
            amount,
            limit,
            issuer_secret,
            distributor_secret,
            network,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets how long each signed transaction stays valid.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn asset_code(&self) -> &AssetCode {
        &self.asset_code
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn limit(&self) -> Amount {
        self.limit
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn issuer_key_pair(&self) -> Result<KeyPair, ConfigError> {
        KeyPair::from_secret(self.issuer_secret.expose_secret())
            .map_err(|e| ConfigError::seed("issuer", e))
    }

    fn distributor_key_pair(&self) -> Result<KeyPair, ConfigError> {
        KeyPair::from_secret(self.distributor_secret.expose_secret())
            .map_err(|e| ConfigError::seed("distributor", e))
    }
}

/// Outcome of a completed issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceReceipt {
    pub asset: Asset,
    pub distributor: PublicKey,
    pub amount: Amount,
    /// Receipt of the distributor's trust transaction.
    pub trust: TransactionReceipt,
    /// Receipt of the issuer's authorize-and-pay transaction.
    pub issue: TransactionReceipt,
}

/// Identity of the token described by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub asset: Asset,
    pub distributor: PublicKey,
}

/// Receives issuance progress.
pub trait IssuanceObserver: Send + Sync {
    fn trust_established(
        &self,
        _asset: &Asset,
        _distributor: &PublicKey,
        _receipt: &TransactionReceipt,
    ) {
    }

    fn tokens_issued(
        &self,
        _asset: &Asset,
        _distributor: &PublicKey,
        _amount: Amount,
        _receipt: &TransactionReceipt,
    ) {
    }
}

/// Reports progress through `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl IssuanceObserver for TracingObserver {
    fn trust_established(
        &self,
        asset: &Asset,
        distributor: &PublicKey,
        receipt: &TransactionReceipt,
    ) {
        tracing::info!(
            "Distributor {} trusts {} (tx {}, ledger {})",
            distributor,
            asset,
            receipt.hash,
            receipt.ledger
        );
    }

    fn tokens_issued(
        &self,
        asset: &Asset,
        distributor: &PublicKey,
        amount: Amount,
        receipt: &TransactionReceipt,
    ) {
        tracing::info!(
            "Issued {} {} to distributor {} (tx {}, ledger {})",
            amount,
            asset.code,
            distributor,
            receipt.hash,
            receipt.ledger
        );
    }
}

/// Ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl IssuanceObserver for SilentObserver {}

/// Runs the trust and issue phases against a [`LedgerClient`].
pub struct TokenIssuer<C> {
    client: C,
    observer: Arc<dyn IssuanceObserver>,
}

impl TokenIssuer<HorizonClient> {
    /// Issuer wired to the Horizon instance of `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Horizon client cannot be configured.
    pub fn for_network(network: Network) -> Result<Self, Error> {
        Ok(Self::new(HorizonClient::for_network(network)?))
    }
}

impl<C: LedgerClient> TokenIssuer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IssuanceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Creates the trustline, then authorizes it and pays the initial supply.
    ///
    /// Signing uses `request.network()`; the client must point at the same
    /// network or the ledger refuses the signatures.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if a key cannot be derived
    /// - [`Error::TrustSubmission`] if loading the distributor, fetching the
    ///   fee or submitting the trust transaction fails; nothing was committed
    /// - [`Error::IssueSubmission`] if loading the issuer or submitting the
    ///   issue transaction fails; the trustline from phase one stays in place
    /// - [`Error::TransactionBuild`] if a transaction cannot be encoded
    pub async fn issue_token(&self, request: &IssuanceRequest) -> Result<IssuanceReceipt, Error> {
        let issuer = request.issuer_key_pair()?;
        let distributor = request.distributor_key_pair()?;
        let asset = Asset::new(request.asset_code.clone(), issuer.public_key());

        tracing::debug!(
            "Issuing {} of {} on {} to {}",
            request.amount,
            asset,
            request.network,
            distributor.public_key()
        );

        let (trust, base_fee) = self
            .establish_trust(request, &asset, &distributor)
            .await
            .inspect_err(|e| tracing::error!("Trust phase failed for {}: {}", asset, e))?;

        let issue = self
            .issue_supply(request, &asset, &issuer, &distributor, base_fee)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    "Issue phase failed for {}: {}. Distributor {} keeps an empty trustline",
                    asset,
                    e,
                    distributor.public_key()
                );
            })?;

        Ok(IssuanceReceipt {
            asset,
            distributor: distributor.public_key(),
            amount: request.amount,
            trust,
            issue,
        })
    }

    async fn establish_trust(
        &self,
        request: &IssuanceRequest,
        asset: &Asset,
        distributor: &KeyPair,
    ) -> Result<(TransactionReceipt, u32), Error> {
        let account = self
            .client
            .load_account(&distributor.public_key())
            .await
            .map_err(Error::TrustSubmission)?;
        let base_fee = self
            .client
            .fetch_base_fee()
            .await
            .map_err(Error::TrustSubmission)?;

        let transaction =
            TransactionBuilder::new(distributor.public_key(), account.sequence, base_fee)
                .add_operation(Operation::change_trust(asset.clone(), request.limit))
                .set_timeout(request.timeout)
                .build()?
                .sign(distributor, request.network)?;

        let receipt = self
            .client
            .submit_transaction(&transaction)
            .await
            .map_err(Error::TrustSubmission)?;
        self.observer
            .trust_established(asset, &distributor.public_key(), &receipt);
        Ok((receipt, base_fee))
    }

    async fn issue_supply(
        &self,
        request: &IssuanceRequest,
        asset: &Asset,
        issuer: &KeyPair,
        distributor: &KeyPair,
        base_fee: u32,
    ) -> Result<TransactionReceipt, Error> {
        let account = self
            .client
            .load_account(&issuer.public_key())
            .await
            .map_err(Error::IssueSubmission)?;

        let transaction = TransactionBuilder::new(issuer.public_key(), account.sequence, base_fee)
            .add_operation(Operation::allow_trust(
                distributor.public_key(),
                asset.code.clone(),
                true,
            ))
            .add_operation(Operation::payment(
                distributor.public_key(),
                asset.clone(),
                request.amount,
            ))
            .set_timeout(request.timeout)
            .build()?
            .sign(issuer, request.network)?;

        let receipt = self
            .client
            .submit_transaction(&transaction)
            .await
            .map_err(Error::IssueSubmission)?;
        self.observer.tokens_issued(
            asset,
            &distributor.public_key(),
            request.amount,
            &receipt,
        );
        Ok(receipt)
    }

    /// Asset identity and distributor account for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a key cannot be derived.
    pub fn token_info(&self, request: &IssuanceRequest) -> Result<TokenInfo, Error> {
        let issuer = request.issuer_key_pair()?;
        let distributor = request.distributor_key_pair()?;
        Ok(TokenInfo {
            asset: Asset::new(request.asset_code.clone(), issuer.public_key()),
            distributor: distributor.public_key(),
        })
    }

    /// Logs the token identity followed by the distributor's balances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountLookup`] if the distributor's balances cannot
    /// be read; the failure is also logged.
    pub async fn describe(&self, request: &IssuanceRequest) -> Result<Vec<BalanceLine>, Error> {
        let info = self.token_info(request)?;
        tracing::info!("Token: {}", info.asset.code);
        tracing::info!("Issuer: {}", info.asset.issuer);
        tracing::info!("Distributor: {}", info.distributor);

        let balances = list_balances(&self.client, &info.distributor)
            .await
            .inspect_err(|e| tracing::error!("Error reading distributor balances: {}", e))?;
        let lines: Vec<BalanceLine> = balances.collect();
        for line in &lines {
            tracing::info!("{}", line);
        }
        Ok(lines)
    }
}

/// Issues a token through the Horizon instance of `request.network()`.
///
/// # Errors
///
/// See [`TokenIssuer::issue_token`].
pub async fn issue_token(request: &IssuanceRequest) -> Result<IssuanceReceipt, Error> {
    TokenIssuer::for_network(request.network())?
        .issue_token(request)
        .await
}
