//! Client side orchestration of token transfers over the portal token bridge.
//!
//! A [`TransferOrchestrator`] owns one [`ChainAdapter`] per chain and an [`AttestationSource`].
//! Signers are handed over per transfer so that keys never live in configuration.

pub mod adapter;
pub mod amount;
pub mod config;
mod error;
pub mod gateway_payload;
pub mod orchestrator;
pub mod source;
pub mod transfer;
pub mod waiter;

pub use {
    adapter::{ChainAdapter, Signer, TokenBridgeContext, UnsignedTx},
    config::{
        ChainConfig, ChainConfigProvider, GuardianSetConfig, StaticChainConfigs, TransferConfig,
    },
    error::{AmountError, ConfigError, Phase, TransferError, TransferFailure, WaitError},
    orchestrator::{TransferOrchestrator, TransferOutcome, TransferQuote},
    source::{AttestationHandle, AttestationSource, AttestationStatus, GuardianRpcSource},
    transfer::{
        ChainAddress, SourceTransfer, TokenAddress, TokenId, Transfer, TransferReceipt,
        TransferRequest, TransferState, TxId,
    },
    waiter::AttestationWaiter,
};
