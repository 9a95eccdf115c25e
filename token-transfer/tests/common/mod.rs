#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use portal_supported_chains::Chain;
use portal_token_transfer::{
    AttestationHandle, AttestationSource, AttestationStatus, ChainAdapter, ChainAddress,
    Signer, SourceTransfer, TokenAddress, TokenBridgeContext, TokenId, TransferConfig,
    TransferOrchestrator, TxId, UnsignedTx,
};
use portal_vaas::{
    signing::{GuardianKey, GuardianSetTable},
    token::{self, Message},
    vaa::{Vaa, VaaBuilder},
    Address, Amount, GuardianSetInfo, WirePayload,
};

pub const SOLANA_ACCOUNT: &str = "B2VfpvVnkCupEf2AYXdDuNun8JpoeV36pFWgVmwv3qsR";
pub const ETHEREUM_ACCOUNT: &str = "0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1";
pub const WORMCHAIN_ACCOUNT: &str = "wormhole1lwc58qfnwycw990cvq0yefnjqqvjgadlzzcpu2";
pub const OSMOSIS_ACCOUNT: &str = "osmo1lwc58qfnwycw990cvq0yefnjqqvjgadlyaxdp6";

pub const EMITTER: Address = Address([0xec; 32]);

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn build(
    cfg: &TransferConfig,
    source: Arc<MockSource>,
    adapters: Vec<MockAdapter>,
) -> TransferOrchestrator {
    adapters
        .into_iter()
        .fold(
            TransferOrchestrator::new(cfg, source, guardian_sets()),
            |o, a| o.with_adapter(Arc::new(a)),
        )
}

/// The three guardians every test VAA is checked against. Quorum is all three.
pub fn guardian_keys() -> Vec<GuardianKey> {
    (1..=3u8)
        .map(|i| GuardianKey::from_bytes(&[i; 32]).unwrap())
        .collect()
}

pub fn guardian_sets() -> Arc<GuardianSetTable> {
    let set = GuardianSetInfo {
        addresses: guardian_keys().iter().map(GuardianKey::address).collect(),
        expiration_time: 0,
    };
    Arc::new(GuardianSetTable::from_iter([(0, set)]))
}

/// Every call an adapter or signer received, in order.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn mentions(journal: &Journal, needle: &str) -> bool {
    entries(journal).iter().any(|e| e.contains(needle))
}

pub struct MockSigner {
    chain: Chain,
    address: String,
    journal: Journal,
    /// Transactions whose description starts with one of these are rejected.
    reject: Vec<String>,
    counter: AtomicU32,
}

impl MockSigner {
    pub fn new(chain: Chain, address: &str, journal: Journal) -> Self {
        MockSigner {
            chain,
            address: address.into(),
            journal,
            reject: Vec::new(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn rejecting(mut self, prefix: &str) -> Self {
        self.reject.push(prefix.into());
        self
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_and_send(&self, txs: Vec<UnsignedTx>) -> anyhow::Result<Vec<TxId>> {
        let mut ids = Vec::new();
        for tx in txs {
            if self.reject.iter().any(|p| tx.description.starts_with(p)) {
                return Err(anyhow!("{} rejected: insufficient funds", tx.description));
            }

            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}: sent {}", self.chain, tx.description));
            ids.push(TxId::new(self.chain, format!("{}-{n}", tx.description)));
        }

        Ok(ids)
    }
}

pub enum Wrapped {
    Yes,
    No,
    LookupFails,
}

pub struct MockAdapter {
    pub chain: Chain,
    pub journal: Journal,
    pub wrapped: Wrapped,
    pub native_decimals: u8,
    pub token_decimals: BTreeMap<Address, u8>,
    pub relayer: Option<Address>,
    pub relayer_fee: u128,
    pub automatic_fails: bool,
    pub attestation_fails: bool,
    pub sequence: u64,
    pub source_transfers: BTreeMap<String, SourceTransfer>,
}

impl MockAdapter {
    pub fn new(chain: Chain, journal: Journal) -> Self {
        MockAdapter {
            chain,
            journal,
            wrapped: Wrapped::No,
            native_decimals: 9,
            token_decimals: BTreeMap::new(),
            relayer: None,
            relayer_fee: 0,
            automatic_fails: false,
            attestation_fails: false,
            sequence: 1,
            source_transfers: BTreeMap::new(),
        }
    }

    fn record(&self, entry: String) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}: {entry}", self.chain));
    }

    fn tx(&self, description: &str) -> Vec<UnsignedTx> {
        vec![UnsignedTx::new(self.chain, description, Vec::new())]
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn token_bridge_context(&self) -> anyhow::Result<TokenBridgeContext> {
        Ok(TokenBridgeContext {
            chain: self.chain,
            token_bridge: Address([0xbb; 32]),
            relayer: self.relayer,
        })
    }

    async fn wrapped_asset_status(&self, token: &TokenId) -> anyhow::Result<Option<TokenId>> {
        self.record(format!("wrap check {token}"));
        match self.wrapped {
            Wrapped::Yes => Ok(Some(TokenId::new(self.chain, Address([0xaa; 32])))),
            Wrapped::No => Ok(None),
            Wrapped::LookupFails => Err(anyhow!("rpc unavailable")),
        }
    }

    async fn create_attestation_tx(&self, token: &TokenId) -> anyhow::Result<Vec<UnsignedTx>> {
        self.record(format!("attest {token}"));
        if self.attestation_fails {
            return Err(anyhow!("attestation already in flight"));
        }
        Ok(self.tx("attest"))
    }

    async fn create_transfer_tx(
        &self,
        token: &TokenId,
        amount: u128,
        _from: &ChainAddress,
        to: &ChainAddress,
        automatic: bool,
    ) -> anyhow::Result<Vec<UnsignedTx>> {
        self.record(format!(
            "transfer {amount} {token} to {} automatic={automatic}",
            to.chain
        ));
        if automatic && self.automatic_fails {
            return Err(anyhow!("relayer rejected the transfer"));
        }
        Ok(self.tx(if automatic { "transfer-automatic" } else { "transfer" }))
    }

    async fn create_transfer_with_payload_tx(
        &self,
        token: &TokenId,
        amount: u128,
        _from: &ChainAddress,
        to: &ChainAddress,
        payload: &[u8],
    ) -> anyhow::Result<Vec<UnsignedTx>> {
        self.record(format!(
            "transfer {amount} {token} to {}:{} payload={}",
            to.chain,
            to.address,
            String::from_utf8_lossy(payload)
        ));
        Ok(self.tx("transfer-with-payload"))
    }

    async fn create_completion_tx(&self, vaa: &[u8]) -> anyhow::Result<Vec<UnsignedTx>> {
        self.record(format!("complete {} byte VAA", vaa.len()));
        Ok(self.tx("complete"))
    }

    async fn native_decimals(&self) -> anyhow::Result<u8> {
        Ok(self.native_decimals)
    }

    async fn token_decimals(&self, token: &TokenId) -> anyhow::Result<u8> {
        match token.address {
            TokenAddress::Address(a) => self
                .token_decimals
                .get(&a)
                .copied()
                .ok_or_else(|| anyhow!("unknown token {token}")),
            TokenAddress::Native => Ok(self.native_decimals),
        }
    }

    async fn relayer_fee(&self, _token: &TokenId, _destination: Chain) -> anyhow::Result<u128> {
        Ok(self.relayer_fee)
    }

    async fn message_id(&self, tx: &TxId) -> anyhow::Result<AttestationHandle> {
        self.record(format!("message id of {}", tx.hash));
        Ok(AttestationHandle {
            chain: self.chain,
            emitter: EMITTER,
            sequence: self.sequence,
        })
    }

    async fn source_transfer(&self, tx: &TxId) -> anyhow::Result<SourceTransfer> {
        self.source_transfers
            .get(&tx.hash)
            .cloned()
            .ok_or_else(|| anyhow!("no transfer in {tx}"))
    }
}

/// Answers `Pending` `pending` times, then the signed VAA, if there is one.
pub struct MockSource {
    vaa: Option<Vec<u8>>,
    pending: u32,
    fetches: AtomicU32,
}

impl MockSource {
    pub fn signed_after(pending: u32, vaa: Vec<u8>) -> Arc<Self> {
        Arc::new(MockSource {
            vaa: Some(vaa),
            pending,
            fetches: AtomicU32::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Arc::new(MockSource {
            vaa: None,
            pending: u32::MAX,
            fetches: AtomicU32::new(0),
        })
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationSource for MockSource {
    async fn fetch(&self, _handle: &AttestationHandle) -> anyhow::Result<AttestationStatus> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.vaa {
            Some(vaa) if n >= self.pending => Ok(AttestationStatus::Signed(vaa.clone())),
            _ => Ok(AttestationStatus::Pending),
        }
    }
}

/// A VAA carrying a plain token transfer of `amount` to `recipient_chain`, signed by every
/// guardian.
pub fn transfer_vaa(emitter_chain: Chain, amount: u64, recipient_chain: Chain) -> Vec<u8> {
    transfer_vaa_signed_by(emitter_chain, amount, recipient_chain, 3)
}

/// Like [`transfer_vaa`], signed by the first `signers` guardians only.
pub fn transfer_vaa_signed_by(
    emitter_chain: Chain,
    amount: u64,
    recipient_chain: Chain,
    signers: usize,
) -> Vec<u8> {
    let payload = Message::Transfer {
        amount: Amount::from(amount),
        token_address: Address([0x06; 32]),
        token_chain: emitter_chain,
        recipient: Address([0x90; 32]),
        recipient_chain,
        fee: Amount::from(0u64),
    }
    .to_vec()
    .unwrap();

    signed(payload, emitter_chain, signers)
}

/// A VAA signed by every guardian, carrying a transfer with payload to the translator on
/// Wormchain.
pub fn gateway_vaa(emitter_chain: Chain, amount: u64, translator: Address) -> Vec<u8> {
    let payload = token::encode_transfer_payload(
        amount,
        &Address([0x06; 32]),
        emitter_chain,
        &translator,
        Chain::Wormchain,
        &Address::ZERO,
        br#"{"gateway_transfer":{}}"#,
    );

    signed(payload, emitter_chain, 3)
}

fn signed(payload: Vec<u8>, emitter_chain: Chain, signers: usize) -> Vec<u8> {
    let mut vaa: Vaa = VaaBuilder::new(emitter_chain, EMITTER)
        .timestamp(1)
        .nonce(421)
        .sequence(1)
        .build(payload);
    for (i, key) in guardian_keys().iter().enumerate().take(signers) {
        vaa.sign(i as u8, key).unwrap();
    }

    vaa.serialize().unwrap()
}
