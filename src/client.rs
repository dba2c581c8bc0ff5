use std::env;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;

use crate::asset::Amount;
use crate::client_trait::LedgerClient;
use crate::model::{AccountResponse, FeeStats, TransactionReceipt, TransactionRejection};
use crate::network::Network;
use crate::signer::{PublicKey, SeedError};
use crate::transaction::SignedTransaction;

/// Base fee (in stroops) used when Horizon reports an unusable value.
pub const FALLBACK_BASE_FEE: u32 = 100;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid issuance configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Trust transaction failed: {0}")]
    TrustSubmission(#[source] LedgerError),
    #[error("Issue transaction failed: {0}")]
    IssueSubmission(#[source] LedgerError),
    #[error("Failed to look up account {account}: {source}")]
    AccountLookup {
        account: String,
        #[source]
        source: LedgerError,
    },
    #[error("Failed to build transaction: {0}")]
    TransactionBuild(String),
    #[error("Ledger request failed: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Invalid retry configuration: {0}")]
    InvalidRetryConfig(String),
    #[error("Failed to parse url: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Input problems caught before any network access.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Returns true if the ledger refused one of the two submitted transactions.
    pub fn is_remote_rejection(&self) -> bool {
        matches!(
            self,
            Error::TrustSubmission(LedgerError::Rejected(_))
                | Error::IssueSubmission(LedgerError::Rejected(_))
        )
    }

    /// The rejection document, if this error carries one.
    pub fn rejection(&self) -> Option<&TransactionRejection> {
        match self {
            Error::TrustSubmission(LedgerError::Rejected(rejection))
            | Error::IssueSubmission(LedgerError::Rejected(rejection))
            | Error::Ledger(LedgerError::Rejected(rejection)) => Some(rejection),
            _ => None,
        }
    }
}

/// Invalid caller input, reported before anything is sent to the ledger
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Amount {amount} cannot be greater than the limit {limit}")]
    AmountExceedsLimit { amount: Amount, limit: Amount },
    #[error("{field} must be greater than zero")]
    NonPositiveAmount { field: &'static str },
    #[error("Invalid amount {0}")]
    InvalidAmount(String),
    #[error("Invalid asset code {0}")]
    InvalidAssetCode(String),
    #[error("Invalid {role} seed: {source}")]
    Seed {
        role: &'static str,
        #[source]
        source: SeedError,
    },
    #[error("Unknown network {0:?}, expected \"Pi Network\" or \"Pi Testnet\"")]
    UnknownNetwork(String),
    #[error("Invalid public key {0}")]
    InvalidPublicKey(String),
}

impl ConfigError {
    pub fn seed(role: &'static str, source: SeedError) -> Self {
        Self::Seed { role, source }
    }

    /// The seed validation failure, if this is one.
    pub fn seed_error(&self) -> Option<&SeedError> {
        match self {
            ConfigError::Seed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures talking to the ledger service
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account {0} not found")]
    AccountNotFound(String),
    #[error("Transaction rejected: {0}")]
    Rejected(TransactionRejection),
    #[error("Horizon request failed with status {status}: {error_text}")]
    RequestFailed {
        status: StatusCode,
        error_text: String,
    },
    #[error("Failed to parse Horizon response: {0}")]
    ResponseParsingFailed(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Retry(RetryError),
    #[error("Invalid Horizon base url: {0}")]
    InvalidBaseUrl(String),
}

impl LedgerError {
    pub fn rejected(rejection: TransactionRejection) -> Self {
        Self::Rejected(rejection)
    }

    pub fn is_account_not_found(&self) -> bool {
        matches!(self, LedgerError::AccountNotFound(_))
    }

    pub fn rejection(&self) -> Option<&TransactionRejection> {
        match self {
            LedgerError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<RetryError> for LedgerError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Transport(e) => LedgerError::Network(e),
            other => LedgerError::Retry(other),
        }
    }
}

/// Terminal outcomes of [`RetryClient::execute_with_retry`]
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("Rate limited: retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Request timeout after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },
    #[error("Request failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("Network error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl RetryError {
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited {
            retry_after_seconds,
        }
    }

    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    pub fn exhausted(attempts: u32, last_error: String) -> Self {
        Self::Exhausted {
            attempts,
            last_error,
        }
    }

    /// Returns the retry delay in seconds if this is a rate limited error
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            RetryError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

/// Configuration for retrying idempotent Horizon reads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds to cap exponential backoff
    pub max_delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            timeout_seconds: 10,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables with default fallbacks
    ///
    /// Environment variables:
    /// - `HORIZON_RETRY_MAX_ATTEMPTS`: Maximum attempts (default: 3)
    /// - `HORIZON_RETRY_BASE_DELAY_MS`: Base delay in milliseconds (default: 1000)
    /// - `HORIZON_RETRY_MAX_DELAY_MS`: Maximum delay in milliseconds (default: 30000)
    /// - `HORIZON_REQUEST_TIMEOUT_SECONDS`: Request timeout in seconds (default: 10)
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable contains an invalid value
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();
        let config = Self {
            max_attempts: env_or("HORIZON_RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay_ms: env_or("HORIZON_RETRY_BASE_DELAY_MS", defaults.base_delay_ms)?,
            max_delay_ms: env_or("HORIZON_RETRY_MAX_DELAY_MS", defaults.max_delay_ms)?,
            timeout_seconds: env_or("HORIZON_REQUEST_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reduced values for faster test execution
    pub fn for_tests() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 50,
            max_delay_ms: 500,
            timeout_seconds: 5,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidRetryConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidRetryConfig(
                "max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.base_delay_ms == 0 {
            return Err(Error::InvalidRetryConfig(
                "base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidRetryConfig(
                "max_delay_ms must be greater than or equal to base_delay_ms".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::InvalidRetryConfig(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| Error::InvalidRetryConfig(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// HTTP client that retries idempotent requests with exponential backoff
///
/// Server errors (5xx), timeouts and transport failures are retried; rate
/// limiting (429) honours `Retry-After`. Other client errors (4xx) are handed
/// back to the caller untouched, since they carry meaning (for example a 404
/// for an unknown account).
#[derive(Debug, Clone)]
pub struct RetryClient {
    client: Client,
    config: RetryConfig,
}

impl RetryClient {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn for_tests() -> Self {
        Self::new(RetryConfig::for_tests())
    }

    /// Executes an HTTP request with retry logic and exponential backoff
    ///
    /// # Errors
    /// Returns `RetryError::Timeout` if the last attempt timed out
    /// Returns `RetryError::RateLimited` if rate limited on the last attempt
    /// Returns `RetryError::Transport` if the last attempt could not reach the server
    /// Returns `RetryError::Exhausted` if all attempts fail otherwise
    pub async fn execute_with_retry<F>(
        &self,
        request_builder: F,
    ) -> Result<reqwest::Response, RetryError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut last_error = String::new();
        let mut last_transport_error = None;
        let mut attempt = 0;

        while attempt < self.config.max_attempts {
            attempt += 1;

            let request =
                request_builder().timeout(StdDuration::from_secs(self.config.timeout_seconds));

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = self.extract_retry_after(&response).unwrap_or(60);

                        tracing::warn!(
                            "Rate limited (429) on attempt {}/{}. Retry after {} seconds",
                            attempt,
                            self.config.max_attempts,
                            retry_after
                        );

                        if attempt >= self.config.max_attempts {
                            return Err(RetryError::rate_limited(retry_after));
                        }

                        let delay_ms = std::cmp::min(
                            retry_after.saturating_mul(1000),
                            self.config.max_delay_ms,
                        );
                        sleep(StdDuration::from_millis(delay_ms)).await;
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = format!("Server error: {status}");
                        last_transport_error = None;
                        tracing::warn!(
                            "Server error {} on attempt {}/{}",
                            status,
                            attempt,
                            self.config.max_attempts
                        );

                        if attempt < self.config.max_attempts {
                            sleep(self.calculate_backoff_delay(attempt)).await;
                            continue;
                        }
                        break;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = e.to_string();

                    if e.is_timeout() {
                        tracing::warn!(
                            "Request timeout on attempt {}/{}",
                            attempt,
                            self.config.max_attempts
                        );

                        if attempt >= self.config.max_attempts {
                            return Err(RetryError::timeout(self.config.timeout_seconds));
                        }
                        last_transport_error = None;
                    } else {
                        tracing::warn!(
                            "Request failed on attempt {}/{}: {}",
                            attempt,
                            self.config.max_attempts,
                            e
                        );
                        last_transport_error = Some(e);
                    }

                    if attempt < self.config.max_attempts {
                        sleep(self.calculate_backoff_delay(attempt)).await;
                    }
                }
            }
        }

        match last_transport_error {
            Some(e) => Err(RetryError::Transport(e)),
            None => Err(RetryError::exhausted(attempt, last_error)),
        }
    }

    /// min(base_delay * 2^(attempt-1) + jitter, max_delay), jitter in [0, base_delay/2]
    fn calculate_backoff_delay(&self, attempt: u32) -> StdDuration {
        use rand::Rng;

        let base_delay = self.config.base_delay_ms;
        let max_delay = self.config.max_delay_ms;

        let exponential_delay =
            base_delay.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = rand::thread_rng().gen_range(0..=base_delay / 2);
        let final_delay = std::cmp::min(exponential_delay.saturating_add(jitter), max_delay);

        tracing::debug!(
            "Backoff delay for attempt {}: {}ms (exponential: {}ms, jitter: {}ms)",
            attempt,
            final_delay,
            exponential_delay,
            jitter
        );

        StdDuration::from_millis(final_delay)
    }

    fn extract_retry_after(&self, response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Client for a Horizon instance
///
/// Reads (account snapshots, fee stats) go through [`RetryClient`].
/// Transaction submission is sent once: a signed envelope is never replayed.
#[derive(Debug, Clone)]
pub struct HorizonClient {
    retry_client: RetryClient,
    base_url: Url,
}

impl HorizonClient {
    /// Creates a client for `network`, honouring the network's base-url
    /// override variable and the retry settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the override is not a valid URL or the retry
    /// configuration is invalid.
    pub fn for_network(network: Network) -> Result<Self, Error> {
        let base_url = horizon_base_url(network)?;
        let config = RetryConfig::from_env()?;
        tracing::debug!("Using Horizon at {} for {}", base_url, network);
        Ok(Self::with_config_and_base_url(config, base_url))
    }

    /// # Errors
    ///
    /// Returns an error if the retry configuration from the environment is invalid.
    pub fn with_base_url(base_url: Url) -> Result<Self, Error> {
        let config = RetryConfig::from_env()?;
        Ok(Self::with_config_and_base_url(config, base_url))
    }

    pub fn with_config_and_base_url(config: RetryConfig, base_url: Url) -> Self {
        Self {
            retry_client: RetryClient::new(config),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &[&str]) -> Result<Url, LedgerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LedgerError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, LedgerError> {
        let url = self.endpoint(path)?;
        let client = self.retry_client.client();
        let response = self
            .retry_client
            .execute_with_retry(|| client.get(url.clone()))
            .await?;

        if response.status() == StatusCode::NOT_FOUND && path.first() == Some(&"accounts") {
            return Err(LedgerError::AccountNotFound(
                path.get(1).copied().unwrap_or_default().to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LedgerError::RequestFailed { status, error_text });
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::ResponseParsingFailed(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn load_account(&self, account_id: &PublicKey) -> Result<AccountResponse, LedgerError> {
        let address = account_id.address();
        tracing::debug!("Loading account {}", address);
        self.get_json(&["accounts", &address]).await
    }

    async fn fetch_base_fee(&self) -> Result<u32, LedgerError> {
        let stats: FeeStats = self.get_json(&["fee_stats"]).await?;
        match stats.last_ledger_base_fee.parse::<u32>() {
            Ok(fee) if fee > 0 => Ok(fee),
            _ => {
                tracing::warn!(
                    "Unusable last_ledger_base_fee {:?}, falling back to {}",
                    stats.last_ledger_base_fee,
                    FALLBACK_BASE_FEE
                );
                Ok(FALLBACK_BASE_FEE)
            }
        }
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        let url = self.endpoint(&["transactions"])?;
        tracing::debug!(
            "Submitting transaction {} from {}",
            transaction.hash_hex(),
            transaction.source()
        );

        let response = self
            .retry_client
            .client()
            .post(url)
            .timeout(StdDuration::from_secs(
                self.retry_client.config().timeout_seconds,
            ))
            .form(&[("tx", transaction.envelope_xdr())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| LedgerError::ResponseParsingFailed(e.to_string()));
        }

        // Only a problem document with result codes means the ledger refused it.
        match serde_json::from_str::<TransactionRejection>(&body) {
            Ok(rejection) if rejection.result_codes().is_some() => {
                tracing::error!(
                    "Transaction {} rejected: {}",
                    transaction.hash_hex(),
                    rejection
                );
                Err(LedgerError::Rejected(rejection))
            }
            _ => Err(LedgerError::RequestFailed {
                status,
                error_text: body,
            }),
        }
    }
}

fn horizon_base_url(network: Network) -> Result<Url, Error> {
    let url_str = env::var(network.horizon_url_env_var())
        .unwrap_or_else(|_| network.horizon_url().to_string());
    Url::parse(&url_str).map_err(Error::from)
}
