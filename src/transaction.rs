//! Transaction construction and signing.
//!
//! Transactions are assembled from [`Operation`]s with a [`TransactionBuilder`],
//! hashed against a [`Network`], and signed into a [`SignedTransaction`] whose
//! base64 XDR envelope is what Horizon accepts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{self as xdr, Limits, WriteXdr};

use crate::asset::{Amount, Asset, AssetCode};
use crate::client::Error;
use crate::network::Network;
use crate::signer::{PublicKey, Signer};

/// Validity window used when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Most operations a single transaction may carry.
pub const MAX_OPERATIONS: usize = 100;

const AUTHORIZED_FLAG: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Source account opts in to hold `asset`, up to `limit`.
    ChangeTrust { asset: Asset, limit: Amount },
    /// Issuer authorizes (or revokes) `trustor`'s trustline for its asset.
    AllowTrust {
        trustor: PublicKey,
        asset_code: AssetCode,
        authorize: bool,
    },
    /// Source account sends `amount` of `asset` to `destination`.
    Payment {
        destination: PublicKey,
        asset: Asset,
        amount: Amount,
    },
}

impl Operation {
    pub fn change_trust(asset: Asset, limit: Amount) -> Self {
        Operation::ChangeTrust { asset, limit }
    }

    pub fn allow_trust(trustor: PublicKey, asset_code: AssetCode, authorize: bool) -> Self {
        Operation::AllowTrust {
            trustor,
            asset_code,
            authorize,
        }
    }

    pub fn payment(destination: PublicKey, asset: Asset, amount: Amount) -> Self {
        Operation::Payment {
            destination,
            asset,
            amount,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ChangeTrust { .. } => "change_trust",
            Operation::AllowTrust { .. } => "allow_trust",
            Operation::Payment { .. } => "payment",
        }
    }

    fn to_xdr(&self) -> xdr::Operation {
        let body = match self {
            Operation::ChangeTrust { asset, limit } => {
                xdr::OperationBody::ChangeTrust(xdr::ChangeTrustOp {
                    line: asset.to_xdr_change_trust(),
                    limit: limit.stroops(),
                })
            }
            Operation::AllowTrust {
                trustor,
                asset_code,
                authorize,
            } => xdr::OperationBody::AllowTrust(xdr::AllowTrustOp {
                trustor: trustor.to_xdr_account_id(),
                asset: asset_code.to_xdr(),
                authorize: if *authorize { AUTHORIZED_FLAG } else { 0 },
            }),
            Operation::Payment {
                destination,
                asset,
                amount,
            } => xdr::OperationBody::Payment(xdr::PaymentOp {
                destination: destination.to_xdr_muxed_account(),
                asset: asset.to_xdr(),
                amount: amount.stroops(),
            }),
        };
        xdr::Operation {
            source_account: None,
            body,
        }
    }
}

/// Assembles an unsigned [`Transaction`] for one source account.
///
/// The builder takes the account's *current* sequence number, as loaded from
/// the ledger, and uses the next one.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    source: PublicKey,
    account_sequence: i64,
    base_fee: u32,
    timeout: Duration,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    pub fn new(source: PublicKey, account_sequence: i64, base_fee: u32) -> Self {
        Self {
            source,
            account_sequence,
            base_fee,
            timeout: DEFAULT_TIMEOUT,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the transaction with time bounds relative to the current time.
    ///
    /// # Errors
    ///
    /// See [`TransactionBuilder::build_at`].
    pub fn build(self) -> Result<Transaction, Error> {
        self.build_at(Utc::now())
    }

    /// Builds the transaction with `max_time = now + timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBuild`] if there are no operations, more
    /// than [`MAX_OPERATIONS`], or the fee or sequence number overflows.
    pub fn build_at(self, now: DateTime<Utc>) -> Result<Transaction, Error> {
        if self.operations.is_empty() {
            return Err(Error::TransactionBuild(
                "transaction has no operations".to_string(),
            ));
        }
        if self.operations.len() > MAX_OPERATIONS {
            return Err(Error::TransactionBuild(format!(
                "transaction has {} operations, at most {MAX_OPERATIONS} allowed",
                self.operations.len()
            )));
        }

        // Bounded by MAX_OPERATIONS above.
        let operation_count = self.operations.len() as u32;
        let fee = self.base_fee.checked_mul(operation_count).ok_or_else(|| {
            Error::TransactionBuild(format!(
                "fee overflow: {} x {operation_count}",
                self.base_fee
            ))
        })?;
        let sequence = self.account_sequence.checked_add(1).ok_or_else(|| {
            Error::TransactionBuild("account sequence number exhausted".to_string())
        })?;
        let max_time = u64::try_from(now.timestamp())
            .unwrap_or(0)
            .saturating_add(self.timeout.as_secs());

        tracing::debug!(
            "Built transaction for {} with sequence {}, fee {}, {} operation(s), valid until {}",
            self.source,
            sequence,
            fee,
            operation_count,
            max_time
        );

        Ok(Transaction {
            source: self.source,
            fee,
            sequence,
            max_time,
            operations: self.operations,
        })
    }
}

/// Unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    source: PublicKey,
    fee: u32,
    sequence: i64,
    max_time: u64,
    operations: Vec<Operation>,
}

impl Transaction {
    pub fn source(&self) -> PublicKey {
        self.source
    }

    /// Total fee in stroops (base fee times operation count).
    pub fn fee(&self) -> u32 {
        self.fee
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Unix time (seconds) after which the ledger rejects the transaction.
    pub fn max_time(&self) -> u64 {
        self.max_time
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    fn to_xdr(&self) -> Result<xdr::Transaction, Error> {
        let operations: Vec<xdr::Operation> =
            self.operations.iter().map(Operation::to_xdr).collect();
        Ok(xdr::Transaction {
            source_account: self.source.to_xdr_muxed_account(),
            fee: self.fee,
            seq_num: xdr::SequenceNumber(self.sequence),
            cond: xdr::Preconditions::Time(xdr::TimeBounds {
                min_time: xdr::TimePoint(0),
                max_time: xdr::TimePoint(self.max_time),
            }),
            memo: xdr::Memo::None,
            operations: operations.try_into().map_err(xdr_error)?,
            ext: xdr::TransactionExt::V0,
        })
    }

    /// Hash that signers sign: SHA-256 of the network id and the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBuild`] if the transaction cannot be encoded.
    pub fn hash(&self, network: Network) -> Result<[u8; 32], Error> {
        let payload = xdr::TransactionSignaturePayload {
            network_id: xdr::Hash(network.network_id()),
            tagged_transaction: xdr::TransactionSignaturePayloadTaggedTransaction::Tx(
                self.to_xdr()?,
            ),
        };
        let bytes = payload.to_xdr(Limits::none()).map_err(xdr_error)?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Signs the transaction for `network`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBuild`] if the transaction or its envelope
    /// cannot be encoded.
    pub fn sign(self, signer: &dyn Signer, network: Network) -> Result<SignedTransaction, Error> {
        let hash = self.hash(network)?;
        let signer_key = signer.public_key();
        let signature = DecoratedSignature {
            hint: signer_key.signature_hint(),
            signature: signer.sign(&hash),
        };
        if signer_key != self.source {
            tracing::debug!(
                "Transaction for {} signed by a different account {}",
                self.source,
                signer_key
            );
        }
        SignedTransaction::new(self, network, hash, vec![signature])
    }
}

/// Signature tagged with the last four bytes of the signer's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: [u8; 64],
}

impl DecoratedSignature {
    fn to_xdr(self) -> Result<xdr::DecoratedSignature, Error> {
        Ok(xdr::DecoratedSignature {
            hint: xdr::SignatureHint(self.hint),
            signature: xdr::Signature(self.signature.to_vec().try_into().map_err(xdr_error)?),
        })
    }
}

/// Signed transaction, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: Transaction,
    network: Network,
    hash: [u8; 32],
    signatures: Vec<DecoratedSignature>,
    envelope_xdr: String,
}

impl SignedTransaction {
    fn new(
        transaction: Transaction,
        network: Network,
        hash: [u8; 32],
        signatures: Vec<DecoratedSignature>,
    ) -> Result<Self, Error> {
        let xdr_signatures = signatures
            .iter()
            .map(|signature| signature.to_xdr())
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = xdr::TransactionEnvelope::Tx(xdr::TransactionV1Envelope {
            tx: transaction.to_xdr()?,
            signatures: xdr_signatures.try_into().map_err(xdr_error)?,
        });
        let envelope_xdr = envelope.to_xdr_base64(Limits::none()).map_err(xdr_error)?;
        Ok(Self {
            transaction,
            network,
            hash,
            signatures,
            envelope_xdr,
        })
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn source(&self) -> PublicKey {
        self.transaction.source
    }

    pub fn sequence(&self) -> i64 {
        self.transaction.sequence
    }

    pub fn operations(&self) -> &[Operation] {
        &self.transaction.operations
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }

    /// Base64 XDR `TransactionEnvelope`, the form Horizon accepts.
    pub fn envelope_xdr(&self) -> &str {
        &self.envelope_xdr
    }

    /// Returns true if one of the signatures verifies against `key`.
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        let hint = key.signature_hint();
        self.signatures
            .iter()
            .filter(|signature| signature.hint == hint)
            .any(|signature| key.verify(&self.hash, &signature.signature))
    }
}

fn xdr_error(err: xdr::Error) -> Error {
    Error::TransactionBuild(format!("XDR encoding failed: {err}"))
}
