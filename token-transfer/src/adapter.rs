//! The contracts a chain integration implements. Everything chain specific (RPC clients,
//! transaction formats, wallets) stays behind these traits.

use async_trait::async_trait;
use portal_supported_chains::Chain;
use portal_vaas::Address;

use crate::{
    source::AttestationHandle,
    transfer::{ChainAddress, SourceTransfer, TokenId, TxId},
};

/// A transaction built by an adapter and not yet signed. `data` is opaque to everything but the
/// adapter and signer of `chain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub chain: Chain,
    pub description: String,
    pub data: Vec<u8>,
}

impl UnsignedTx {
    pub fn new(chain: Chain, description: impl Into<String>, data: Vec<u8>) -> Self {
        UnsignedTx {
            chain,
            description: description.into(),
            data,
        }
    }
}

/// Holds the keys of one account on one chain.
#[async_trait]
pub trait Signer: Send + Sync {
    fn chain(&self) -> Chain;

    /// Native-format address of the account.
    fn address(&self) -> String;

    /// Signs `txs`, submits them in order and waits until the chain has accepted each one.
    async fn sign_and_send(&self, txs: Vec<UnsignedTx>) -> anyhow::Result<Vec<TxId>>;
}

/// Token bridge deployment details for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBridgeContext {
    pub chain: Chain,
    pub token_bridge: Address,
    /// The automatic relayer contract, when the chain has one.
    pub relayer: Option<Address>,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> Chain;

    async fn token_bridge_context(&self) -> anyhow::Result<TokenBridgeContext>;

    /// The local representation of `token` on this chain, if it has been attested here.
    async fn wrapped_asset_status(&self, token: &TokenId) -> anyhow::Result<Option<TokenId>>;

    async fn create_attestation_tx(&self, token: &TokenId) -> anyhow::Result<Vec<UnsignedTx>>;

    /// `amount` is in base units of `token`.
    async fn create_transfer_tx(
        &self,
        token: &TokenId,
        amount: u128,
        from: &ChainAddress,
        to: &ChainAddress,
        automatic: bool,
    ) -> anyhow::Result<Vec<UnsignedTx>>;

    /// Sends `token` to the contract `to` together with `payload` for it to act on.
    async fn create_transfer_with_payload_tx(
        &self,
        _token: &TokenId,
        _amount: u128,
        _from: &ChainAddress,
        _to: &ChainAddress,
        _payload: &[u8],
    ) -> anyhow::Result<Vec<UnsignedTx>> {
        Err(anyhow::anyhow!(
            "{} does not support transfers with payload",
            self.chain()
        ))
    }

    async fn create_completion_tx(&self, vaa: &[u8]) -> anyhow::Result<Vec<UnsignedTx>>;

    async fn native_decimals(&self) -> anyhow::Result<u8>;

    async fn token_decimals(&self, token: &TokenId) -> anyhow::Result<u8>;

    /// Fee charged by the automatic relayer for delivering `token` to `destination`, in base
    /// units of `token`. Chains without a relayer charge nothing.
    async fn relayer_fee(&self, _token: &TokenId, _destination: Chain) -> anyhow::Result<u128> {
        Ok(0)
    }

    /// The message a confirmed transfer transaction emitted.
    async fn message_id(&self, tx: &TxId) -> anyhow::Result<AttestationHandle>;

    /// Reads a transfer back from its source transaction.
    async fn source_transfer(&self, tx: &TxId) -> anyhow::Result<SourceTransfer>;
}
