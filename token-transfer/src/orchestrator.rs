//! Drives a [`Transfer`] from request to completion.
//!
//! ```markdown
//! Created -> WrapCheckPending -> [AttestationRequested] -> Initiated -> AwaitingAttestation -> Completed
//!                                                              |                                ^
//!                                                              +---------- automatic -----------+
//! ```
//!
//! The wrap check and the attestation request are best effort. Initiation, the attestation wait
//! and completion are not: their failure ends the transfer in `Failed` and the caller gets a
//! [`TransferFailure`] holding whatever the finished phases produced.
//!
//! Routing, signer checks, decimal resolution and the quote all run before the wrap check, in
//! phase `Quote`. A request that cannot be priced or routed fails there without submitting
//! anything, so the amount a transfer carries is already normalized when `Created` is left.
//!
//! A VAA is only completed once it reaches quorum against the orchestrator's guardian sets;
//! anything less keeps the wait going until it times out.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use log::{debug, info, warn};
use portal_supported_chains::Chain;
use portal_vaas::{
    signing::GuardianSetTable,
    token::{Message, ReservedBytes},
    Address, Vaa, VaaError,
};

use crate::{
    adapter::{ChainAdapter, Signer, UnsignedTx},
    amount::{parse_units, payload_amount},
    config::{ChainConfig, ChainConfigProvider, StaticChainConfigs, TransferConfig},
    error::{AmountError, Phase, TransferError, TransferFailure},
    gateway_payload::GatewayIbcTokenBridgePayload,
    source::{AttestationHandle, AttestationSource, GuardianRpcSource},
    transfer::{
        Attestation, ChainAddress, TokenId, Transfer, TransferReceipt, TransferRequest,
        TransferState, TxId,
    },
    waiter::AttestationWaiter,
};

/// Cosmos chains reached over IBC through the translator contract on Wormchain.
pub fn is_gateway_chain(chain: Chain) -> bool {
    matches!(
        chain,
        Chain::Osmosis
            | Chain::Cosmoshub
            | Chain::Evmos
            | Chain::Kujira
            | Chain::Neutron
            | Chain::Celestia
            | Chain::Stargaze
            | Chain::Seda
            | Chain::Dymension
            | Chain::Provenance
    )
}

/// Amounts in base units of the token on the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferQuote {
    pub source_amount: u128,
    pub relayer_fee: u128,
    pub destination_amount: u128,
    pub decimals: u8,
}

#[derive(Debug)]
pub enum TransferOutcome {
    /// The request asked for a quote only. Nothing was submitted.
    QuoteOnly(TransferQuote),
    Executed {
        transfer: Transfer,
        quote: TransferQuote,
    },
}

/// Where the transfer lands and what it carries.
struct Route {
    /// The chain the completion transaction is submitted on.
    completion: Chain,
    to: ChainAddress,
    payload: Option<Vec<u8>>,
}

type PhaseResult<T> = Result<T, (Phase, TransferError)>;

fn at(phase: Phase) -> impl FnOnce(TransferError) -> (Phase, TransferError) {
    move |e| (phase, e)
}

fn rejected(phase: Phase) -> impl FnOnce(anyhow::Error) -> TransferError {
    move |source| TransferError::TransactionRejected { phase, source }
}

pub struct TransferOrchestrator {
    adapters: BTreeMap<Chain, Arc<dyn ChainAdapter>>,
    chains: Arc<dyn ChainConfigProvider>,
    waiter: AttestationWaiter,
    attestation_timeout: Duration,
    reserved_bytes: ReservedBytes,
}

impl TransferOrchestrator {
    /// Attestations from `source` are used only once they reach quorum against `guardian_sets`.
    pub fn new(
        config: &TransferConfig,
        source: Arc<dyn AttestationSource>,
        guardian_sets: Arc<GuardianSetTable>,
    ) -> Self {
        TransferOrchestrator {
            adapters: BTreeMap::new(),
            chains: Arc::new(StaticChainConfigs::from(config)),
            waiter: AttestationWaiter::new(source, config.poll_interval(), guardian_sets),
            attestation_timeout: config.attestation_timeout(),
            reserved_bytes: config.reserved_bytes,
        }
    }

    /// Polls the guardian RPC hosts named by `config` and verifies against its guardian sets.
    pub fn from_config(config: &TransferConfig) -> anyhow::Result<Self> {
        let guardian_sets = config.guardian_set_table()?;
        let source = GuardianRpcSource::new(config.guardian_rpcs())?;
        Ok(Self::new(config, Arc::new(source), Arc::new(guardian_sets)))
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapters.insert(adapter.chain(), adapter);
        self
    }

    pub fn with_chain_configs(mut self, chains: Arc<dyn ChainConfigProvider>) -> Self {
        self.chains = chains;
        self
    }

    fn adapter(&self, chain: Chain) -> Result<&Arc<dyn ChainAdapter>, TransferError> {
        self.adapters
            .get(&chain)
            .ok_or(TransferError::UnsupportedChain(chain))
    }

    fn chain_config(&self, chain: Chain) -> Option<&ChainConfig> {
        self.chains.chain_config(chain)
    }

    fn wants_relay(&self, request: &TransferRequest) -> bool {
        request.automatic
            && !is_gateway_chain(request.destination)
            && self
                .chain_config(request.source)
                .map_or(true, |c| c.automatic_relay)
    }

    /// Checks that `signer` signs on `chain` as the account configured for it, if any.
    fn check_signer(&self, signer: &dyn Signer, chain: Chain) -> Result<(), TransferError> {
        if signer.chain() != chain {
            return Err(TransferError::WrongSignerChain {
                expected: chain,
                found: signer.chain(),
            });
        }

        let Some(expected) = self.chain_config(chain).and_then(|c| c.account.as_deref()) else {
            return Ok(());
        };

        let found = signer.address();
        let same = match (
            Address::from_native(chain, expected),
            Address::from_native(chain, &found),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => expected == found,
        };

        if !same {
            return Err(TransferError::SignerMismatch {
                chain,
                expected: expected.to_string(),
                found,
            });
        }

        Ok(())
    }

    fn route(
        &self,
        request: &TransferRequest,
        destination_signer: &dyn Signer,
    ) -> Result<Route, TransferError> {
        let destination = request.destination;

        if !is_gateway_chain(destination) {
            let recipient = match &request.recipient {
                Some(r) => r.clone(),
                None => destination_signer.address(),
            };
            let to = Address::from_native(destination, &recipient)?;

            return Ok(Route {
                completion: destination,
                to: ChainAddress::new(destination, to),
                payload: None,
            });
        }

        let channel = self
            .chains
            .ibc_channel(Chain::Wormchain, destination)
            .ok_or(TransferError::NoIbcChannel(destination))?;
        let translator = self
            .chain_config(Chain::Wormchain)
            .and_then(|c| c.ibc_translator)
            .ok_or_else(|| TransferError::MissingConfig("IBC translator on Wormchain".into()))?;

        // Cosmos accounts share their key across chains, so the Wormchain signer's account
        // stands in for the recipient unless one was named.
        let recipient = match &request.recipient {
            Some(r) => r.clone(),
            None => {
                let prefix = self
                    .chain_config(destination)
                    .and_then(|c| c.bech32_prefix.as_deref());
                Address::from_native(Chain::Wormchain, &destination_signer.address())?
                    .to_native(destination, prefix)?
            }
        };
        Address::from_native(destination, &recipient)?;

        let payload = GatewayIbcTokenBridgePayload::transfer(
            u16::from(destination),
            &recipient,
            0,
            rand::random(),
        )
        .to_vec()?;

        debug!("routing to {recipient} on {destination} over Wormchain {channel}");
        Ok(Route {
            completion: Chain::Wormchain,
            to: ChainAddress::new(Chain::Wormchain, translator),
            payload: Some(payload),
        })
    }

    async fn decimals(&self, source: Chain, token: &TokenId) -> Result<u8, TransferError> {
        if token.is_native() {
            if let Some(d) = self.chain_config(token.chain).and_then(|c| c.native_decimals) {
                return Ok(d);
            }

            return self
                .adapter(token.chain)?
                .native_decimals()
                .await
                .map_err(TransferError::ChainQueryFailure);
        }

        self.adapter(source)?
            .token_decimals(token)
            .await
            .map_err(TransferError::ChainQueryFailure)
    }

    async fn quote_with(
        &self,
        request: &TransferRequest,
        relay: bool,
    ) -> Result<TransferQuote, TransferError> {
        let decimals = self.decimals(request.source, &request.token).await?;
        let amount = parse_units(&request.amount, decimals)?;
        if amount == 0 {
            return Err(AmountError::Zero.into());
        }
        payload_amount(amount, decimals)?;

        let relayer_fee = if relay {
            self.adapter(request.source)?
                .relayer_fee(&request.token, request.destination)
                .await
                .map_err(TransferError::ChainQueryFailure)?
        } else {
            0
        };

        let destination_amount =
            amount
                .checked_sub(relayer_fee)
                .ok_or(TransferError::InsufficientAmount {
                    amount,
                    fee: relayer_fee,
                })?;

        Ok(TransferQuote {
            source_amount: amount,
            relayer_fee,
            destination_amount,
            decimals,
        })
    }

    /// Prices `request` without submitting anything.
    pub async fn quote(&self, request: &TransferRequest) -> Result<TransferQuote, TransferError> {
        self.quote_with(request, self.wants_relay(request)).await
    }

    pub async fn execute(
        &self,
        request: &TransferRequest,
        source_signer: &dyn Signer,
        destination_signer: &dyn Signer,
    ) -> Result<TransferOutcome, TransferFailure> {
        let fail = |error| TransferFailure {
            phase: Phase::Quote,
            error,
            receipt: TransferReceipt::default(),
        };

        let relay = self.wants_relay(request);
        let route = self.route(request, destination_signer).map_err(fail)?;
        self.check_signer(source_signer, request.source)
            .map_err(fail)?;
        self.check_signer(destination_signer, route.completion)
            .map_err(fail)?;

        let quote = self.quote_with(request, relay).await.map_err(fail)?;
        info!(
            "quote for {} {}: {} in, {} relayer fee, {} out",
            request.amount,
            request.token,
            quote.source_amount,
            quote.relayer_fee,
            quote.destination_amount
        );
        if !request.execute {
            return Ok(TransferOutcome::QuoteOnly(quote));
        }

        let from = Address::from_native(request.source, &source_signer.address())
            .map_err(|e| fail(e.into()))?;
        let mut transfer = Transfer::new(
            request.token,
            quote.source_amount,
            quote.decimals,
            ChainAddress::new(request.source, from),
            route.to,
            relay,
        );

        match self
            .run(&mut transfer, &route, source_signer, destination_signer)
            .await
        {
            Ok(()) => {
                info!("transfer of {} completed", transfer.token);
                Ok(TransferOutcome::Executed { transfer, quote })
            }
            Err((phase, error)) => Err(self.fail(transfer, phase, error)),
        }
    }

    /// Picks up a transfer the source chain has already accepted and completes it manually.
    pub async fn resume(
        &self,
        tx: TxId,
        destination_signer: &dyn Signer,
    ) -> Result<Transfer, TransferFailure> {
        let fail = |error| TransferFailure {
            phase: Phase::Resume,
            error,
            receipt: TransferReceipt {
                source_txs: vec![tx.clone()],
                ..Default::default()
            },
        };

        info!("resuming transfer from {tx}");
        let source = self.adapter(tx.chain).map_err(fail)?;
        let details = source
            .source_transfer(&tx)
            .await
            .map_err(|e| fail(TransferError::ChainQueryFailure(e)))?;
        let handle = details.attestation;

        let mut transfer = Transfer::from_source_tx(tx.clone(), details);
        let completion = transfer.to.chain;
        let prepared = self
            .check_signer(destination_signer, completion)
            .and_then(|()| self.adapter(completion).cloned());
        let completion = match prepared {
            Ok(adapter) => adapter,
            Err(error) => return Err(self.fail(transfer, Phase::Resume, error)),
        };

        match self
            .complete(&mut transfer, &*completion, handle, destination_signer)
            .await
        {
            Ok(()) => Ok(transfer),
            Err((phase, error)) => Err(self.fail(transfer, phase, error)),
        }
    }

    fn fail(&self, mut transfer: Transfer, phase: Phase, error: TransferError) -> TransferFailure {
        warn!("transfer of {} failed during {phase}: {error}", transfer.token);
        if let Err(e) = transfer.advance(TransferState::Failed) {
            debug!("{e}");
        }

        TransferFailure {
            phase,
            error,
            receipt: transfer.receipt,
        }
    }

    async fn run(
        &self,
        transfer: &mut Transfer,
        route: &Route,
        source_signer: &dyn Signer,
        destination_signer: &dyn Signer,
    ) -> PhaseResult<()> {
        let source = self
            .adapter(transfer.from.chain)
            .map_err(at(Phase::WrapCheck))?;
        let completion = self
            .adapter(route.completion)
            .map_err(at(Phase::WrapCheck))?;

        transfer
            .advance(TransferState::WrapCheckPending)
            .map_err(at(Phase::WrapCheck))?;
        if self.is_wrapped(&**completion, &transfer.token).await {
            info!(
                "{} is already known on {}, skipping attestation",
                transfer.token, route.completion
            );
        } else {
            transfer
                .advance(TransferState::AttestationRequested)
                .map_err(at(Phase::Attestation))?;
            match self
                .attest(&**source, &transfer.token, source_signer)
                .await
            {
                Ok(txs) => transfer.receipt.attestation_txs = txs,
                Err(e) => warn!(
                    "attestation of {} failed, continuing: {e}",
                    transfer.token
                ),
            }
        }

        if transfer.automatic && !self.has_relayer(&**source).await {
            transfer.automatic = false;
        }

        if transfer.automatic {
            match self
                .initiate(&**source, transfer, route, true, source_signer)
                .await
            {
                Ok(txs) => {
                    info!("automatic transfer accepted by {}", transfer.from.chain);
                    transfer.receipt.source_txs = txs;
                    transfer
                        .advance(TransferState::Initiated)
                        .map_err(at(Phase::Initiate))?;
                    return transfer
                        .advance(TransferState::Completed)
                        .map_err(at(Phase::Complete));
                }
                Err(e) => {
                    warn!("automatic transfer failed, falling back to manual: {e}");
                    transfer.automatic = false;
                }
            }
        }

        let txs = self
            .initiate(&**source, transfer, route, false, source_signer)
            .await
            .map_err(at(Phase::Initiate))?;
        info!("transfer initiated on {}: {txs:?}", transfer.from.chain);
        transfer.receipt.source_txs = txs;
        transfer
            .advance(TransferState::Initiated)
            .map_err(at(Phase::Initiate))?;

        let handle = self
            .message_id(&**source, &transfer.receipt.source_txs)
            .await
            .map_err(at(Phase::AwaitAttestation))?;
        transfer.receipt.attestation = Some(Attestation { handle, vaa: None });
        transfer
            .advance(TransferState::AwaitingAttestation)
            .map_err(at(Phase::AwaitAttestation))?;

        self.complete(transfer, &**completion, handle, destination_signer)
            .await
    }

    async fn has_relayer(&self, source: &dyn ChainAdapter) -> bool {
        match source.token_bridge_context().await {
            Ok(ctx) if ctx.relayer.is_some() => true,
            Ok(_) => {
                warn!("{} has no automatic relayer, using manual transfer", source.chain());
                false
            }
            Err(e) => {
                warn!(
                    "token bridge lookup on {} failed, using manual transfer: {e:#}",
                    source.chain()
                );
                false
            }
        }
    }

    /// Any lookup failure counts as not wrapped.
    async fn is_wrapped(&self, completion: &dyn ChainAdapter, token: &TokenId) -> bool {
        if token.chain == completion.chain() {
            return true;
        }

        match completion.wrapped_asset_status(token).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                warn!("wrap check for {token} on {} failed: {e:#}", completion.chain());
                false
            }
        }
    }

    async fn attest(
        &self,
        source: &dyn ChainAdapter,
        token: &TokenId,
        signer: &dyn Signer,
    ) -> Result<Vec<TxId>, TransferError> {
        info!("requesting attestation of {token}");
        submit(
            signer,
            Phase::Attestation,
            source.create_attestation_tx(token).await,
        )
        .await
    }

    async fn initiate(
        &self,
        source: &dyn ChainAdapter,
        transfer: &Transfer,
        route: &Route,
        automatic: bool,
        signer: &dyn Signer,
    ) -> Result<Vec<TxId>, TransferError> {
        let txs = match &route.payload {
            Some(payload) => {
                source
                    .create_transfer_with_payload_tx(
                        &transfer.token,
                        transfer.amount,
                        &transfer.from,
                        &transfer.to,
                        payload,
                    )
                    .await
            }
            None => {
                source
                    .create_transfer_tx(
                        &transfer.token,
                        transfer.amount,
                        &transfer.from,
                        &transfer.to,
                        automatic,
                    )
                    .await
            }
        };

        submit(signer, Phase::Initiate, txs).await
    }

    async fn message_id(
        &self,
        source: &dyn ChainAdapter,
        txs: &[TxId],
    ) -> Result<AttestationHandle, TransferError> {
        let last = txs.last().ok_or_else(|| {
            TransferError::ChainQueryFailure(anyhow::anyhow!(
                "{} returned no transaction ids",
                source.chain()
            ))
        })?;

        source
            .message_id(last)
            .await
            .map_err(TransferError::ChainQueryFailure)
    }

    async fn complete(
        &self,
        transfer: &mut Transfer,
        completion: &dyn ChainAdapter,
        handle: AttestationHandle,
        signer: &dyn Signer,
    ) -> PhaseResult<()> {
        let vaa = self
            .waiter
            .wait(&handle, self.attestation_timeout)
            .await
            .map_err(TransferError::from)
            .map_err(at(Phase::AwaitAttestation))?;
        self.inspect(&vaa)
            .map_err(TransferError::from)
            .map_err(at(Phase::AwaitAttestation))?;
        transfer.receipt.attestation = Some(Attestation {
            handle,
            vaa: Some(vaa.clone()),
        });

        info!("completing transfer on {}", completion.chain());
        let txs = submit(
            signer,
            Phase::Complete,
            completion.create_completion_tx(&vaa).await,
        )
        .await
        .map_err(at(Phase::Complete))?;
        transfer.receipt.destination_txs = txs;

        transfer
            .advance(TransferState::Completed)
            .map_err(at(Phase::Complete))
    }

    /// Only token transfers can be completed.
    fn inspect(&self, raw: &[u8]) -> Result<(), VaaError> {
        let vaa = Vaa::<Vec<u8>>::deserialize(raw)?;
        match Message::decode_with(&vaa.payload, self.reserved_bytes)? {
            Message::Transfer {
                amount,
                recipient_chain,
                ..
            } => debug!(
                "VAA {}/{}: transfer of {:?} to {recipient_chain}",
                vaa.emitter_chain,
                vaa.sequence,
                amount.to_u128()
            ),
            Message::TransferWithPayload(t) => debug!(
                "VAA {}/{}: transfer of {} with {} payload bytes to {}",
                vaa.emitter_chain,
                vaa.sequence,
                t.amount,
                t.payload.len(),
                t.recipient_chain
            ),
            Message::AssetMeta { .. } => {
                return Err(VaaError::UnknownPayloadType {
                    expected: "token transfer",
                    found: "asset metadata".into(),
                })
            }
        }

        Ok(())
    }
}

async fn submit(
    signer: &dyn Signer,
    phase: Phase,
    txs: anyhow::Result<Vec<UnsignedTx>>,
) -> Result<Vec<TxId>, TransferError> {
    let txs = txs.map_err(rejected(phase))?;
    signer.sign_and_send(txs).await.map_err(rejected(phase))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gateway_chains() {
        assert!(is_gateway_chain(Chain::Osmosis));
        assert!(is_gateway_chain(Chain::Cosmoshub));
        assert!(!is_gateway_chain(Chain::Wormchain));
        assert!(!is_gateway_chain(Chain::Terra2));
        assert!(!is_gateway_chain(Chain::Ethereum));
    }
}
