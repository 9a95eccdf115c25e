use std::{fmt, io, path::PathBuf};

use portal_supported_chains::Chain;
use portal_vaas::{AddressError, VaaError};
use thiserror::Error;

use crate::transfer::{TransferReceipt, TransferState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("amount {0:?} does not fit in 128 bits at the requested precision")]
    Overflow(String),
    #[error("amount must be greater than zero")]
    Zero,
    #[error("normalized amount {0} does not fit in the 64 bit payload field")]
    TooLarge(u128),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Why waiting for an attestation stopped without one.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("no attestation after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    #[error("attestation source rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Vaa(#[from] VaaError),

    #[error("chain query failed: {0:#}")]
    ChainQueryFailure(anyhow::Error),
    #[error("{phase} transaction rejected: {source:#}")]
    TransactionRejected {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },
    #[error("attestation timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    #[error("attestation source rejected the request: {0}")]
    AttestationRejected(String),

    #[error("amount {amount} does not cover the relayer fee {fee}")]
    InsufficientAmount { amount: u128, fee: u128 },
    #[error("signer address {found} on {chain} does not match the configured account {expected}")]
    SignerMismatch {
        chain: Chain,
        expected: String,
        found: String,
    },
    #[error("signer for {found} handed over where {expected} is required")]
    WrongSignerChain { expected: Chain, found: Chain },
    #[error("no adapter configured for {0}")]
    UnsupportedChain(Chain),
    #[error("missing configuration: {0}")]
    MissingConfig(String),
    #[error("invalid application payload: {0}")]
    ApplicationPayload(#[from] serde_json::Error),
    #[error("no IBC channel from Wormchain to {0}")]
    NoIbcChannel(Chain),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: TransferState, to: TransferState },
}

impl From<WaitError> for TransferError {
    fn from(e: WaitError) -> Self {
        match e {
            WaitError::Timeout { elapsed_ms } => TransferError::Timeout { elapsed_ms },
            WaitError::Rejected(reason) => TransferError::AttestationRejected(reason),
        }
    }
}

/// The phases of a transfer, named in failures and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Quote,
    WrapCheck,
    Attestation,
    Initiate,
    AwaitAttestation,
    Complete,
    Resume,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Quote => "quote",
            Phase::WrapCheck => "wrap check",
            Phase::Attestation => "attestation",
            Phase::Initiate => "initiate",
            Phase::AwaitAttestation => "await attestation",
            Phase::Complete => "complete",
            Phase::Resume => "resume",
        })
    }
}

/// A transfer that stopped before `Completed`. `receipt` holds everything the finished phases
/// produced, so a caller can resume from the source transaction instead of starting over.
#[derive(Debug, Error)]
#[error("transfer failed during {phase}: {error}")]
pub struct TransferFailure {
    pub phase: Phase,
    #[source]
    pub error: TransferError,
    pub receipt: TransferReceipt,
}

impl TransferFailure {
    /// Whether the source chain has already accepted the transfer, in which case retrying from
    /// scratch would move the funds twice.
    pub fn is_resumable(&self) -> bool {
        !self.receipt.source_txs.is_empty()
    }
}
