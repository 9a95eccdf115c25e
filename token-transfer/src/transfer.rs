//! The `Transfer` aggregate and the state machine it moves through.

use std::fmt;

use portal_supported_chains::Chain;
use portal_vaas::Address;
use serde::{Deserialize, Serialize};

use crate::{error::TransferError, source::AttestationHandle};

/// Where a token lives natively. `Native` is the gas token of the chain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenAddress {
    Native,
    Address(Address),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId {
    pub chain: Chain,
    pub address: TokenAddress,
}

impl TokenId {
    pub fn native(chain: Chain) -> Self {
        TokenId {
            chain,
            address: TokenAddress::Native,
        }
    }

    pub fn new(chain: Chain, address: Address) -> Self {
        TokenId {
            chain,
            address: TokenAddress::Address(address),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address == TokenAddress::Native
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            TokenAddress::Native => write!(f, "{}:native", self.chain),
            TokenAddress::Address(a) => write!(f, "{}:{a}", self.chain),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: Address,
}

impl ChainAddress {
    pub fn new(chain: Chain, address: Address) -> Self {
        ChainAddress { chain, address }
    }
}

/// A transaction on `chain`, identified the way that chain's explorers do.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId {
    pub chain: Chain,
    pub hash: String,
}

impl TxId {
    pub fn new(chain: Chain, hash: impl Into<String>) -> Self {
        TxId {
            chain,
            hash: hash.into(),
        }
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.hash)
    }
}

fn yes() -> bool {
    true
}

/// What a caller asks for. `amount` is human readable, in whole tokens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token: TokenId,
    pub amount: String,
    pub source: Chain,
    pub destination: Chain,
    #[serde(default)]
    pub automatic: bool,
    /// Native-format recipient on `destination`. Defaults to the destination signer.
    #[serde(default)]
    pub recipient: Option<String>,
    /// When false only a quote is produced and nothing is submitted.
    #[serde(default = "yes")]
    pub execute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    Created,
    WrapCheckPending,
    AttestationRequested,
    Initiated,
    AwaitingAttestation,
    Completed,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }

    /// The transition table. `Failed` is reachable from every non-terminal state.
    pub fn can_advance_to(&self, next: TransferState) -> bool {
        use TransferState::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Created, WrapCheckPending)
                | (WrapCheckPending, AttestationRequested)
                | (WrapCheckPending, Initiated)
                | (AttestationRequested, Initiated)
                | (Initiated, AwaitingAttestation)
                | (Initiated, Completed)
                | (AwaitingAttestation, Completed)
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The signed attestation of a transfer, once the guardians have produced it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub handle: AttestationHandle,
    pub vaa: Option<Vec<u8>>,
}

/// Everything the finished phases of a transfer produced.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub attestation_txs: Vec<TxId>,
    pub source_txs: Vec<TxId>,
    pub attestation: Option<Attestation>,
    pub destination_txs: Vec<TxId>,
}

/// A transfer already accepted by its source chain, as read back from that chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTransfer {
    pub token: TokenId,
    /// Amount in base units of the token.
    pub amount: u128,
    pub decimals: u8,
    pub from: ChainAddress,
    pub to: ChainAddress,
    pub automatic: bool,
    pub attestation: AttestationHandle,
}

/// One end-to-end bridging operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub token: TokenId,
    /// Amount in base units of the token on the source chain.
    pub amount: u128,
    pub decimals: u8,
    pub from: ChainAddress,
    pub to: ChainAddress,
    pub automatic: bool,
    pub receipt: TransferReceipt,
    state: TransferState,
}

impl Transfer {
    pub fn new(
        token: TokenId,
        amount: u128,
        decimals: u8,
        from: ChainAddress,
        to: ChainAddress,
        automatic: bool,
    ) -> Self {
        Transfer {
            token,
            amount,
            decimals,
            from,
            to,
            automatic,
            receipt: TransferReceipt::default(),
            state: TransferState::Created,
        }
    }

    /// Rebuilds an in-flight transfer from its source transaction. The result is waiting for
    /// its attestation.
    pub fn from_source_tx(tx: TxId, source: SourceTransfer) -> Self {
        Transfer {
            token: source.token,
            amount: source.amount,
            decimals: source.decimals,
            from: source.from,
            to: source.to,
            automatic: source.automatic,
            receipt: TransferReceipt {
                source_txs: vec![tx],
                attestation: Some(Attestation {
                    handle: source.attestation,
                    vaa: None,
                }),
                ..Default::default()
            },
            state: TransferState::AwaitingAttestation,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn advance(&mut self, next: TransferState) -> Result<(), TransferError> {
        if !self.state.can_advance_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        log::debug!("transfer of {} {} -> {next}", self.token, self.state);
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn transfer() -> Transfer {
        Transfer::new(
            TokenId::native(Chain::Solana),
            5,
            9,
            ChainAddress::new(Chain::Solana, Address([1; 32])),
            ChainAddress::new(Chain::Ethereum, Address([2; 32])),
            false,
        )
    }

    #[test]
    fn happy_path() {
        let mut t = transfer();
        assert_eq!(TransferState::Created, t.state());

        for next in [
            TransferState::WrapCheckPending,
            TransferState::AttestationRequested,
            TransferState::Initiated,
            TransferState::AwaitingAttestation,
            TransferState::Completed,
        ] {
            t.advance(next).unwrap();
            assert_eq!(next, t.state());
        }
        assert!(t.state().is_terminal());
    }

    #[test]
    fn skips() {
        let mut t = transfer();
        t.advance(TransferState::WrapCheckPending).unwrap();
        t.advance(TransferState::Initiated).unwrap();
        t.advance(TransferState::Completed).unwrap();
    }

    #[test]
    fn illegal_transitions() {
        let mut t = transfer();
        let err = t.advance(TransferState::Initiated).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidTransition {
                from: TransferState::Created,
                to: TransferState::Initiated
            }
        ));
        assert_eq!(TransferState::Created, t.state());

        t.advance(TransferState::Failed).unwrap();
        assert!(t.advance(TransferState::Failed).is_err());
        assert!(t.advance(TransferState::WrapCheckPending).is_err());

        assert!(!TransferState::Completed.can_advance_to(TransferState::Failed));
        assert!(!TransferState::AwaitingAttestation.can_advance_to(TransferState::Initiated));
    }

    #[test]
    fn failed_from_any_live_state() {
        use TransferState::*;
        for s in [
            Created,
            WrapCheckPending,
            AttestationRequested,
            Initiated,
            AwaitingAttestation,
        ] {
            assert!(s.can_advance_to(Failed), "{s}");
        }
    }

    #[test]
    fn resume_enters_awaiting_attestation() {
        let handle = AttestationHandle {
            chain: Chain::Solana,
            emitter: Address([3; 32]),
            sequence: 42,
        };
        let tx = TxId::new(Chain::Solana, "5xyz");
        let t = Transfer::from_source_tx(
            tx.clone(),
            SourceTransfer {
                token: TokenId::native(Chain::Solana),
                amount: 10,
                decimals: 9,
                from: ChainAddress::new(Chain::Solana, Address([1; 32])),
                to: ChainAddress::new(Chain::Ethereum, Address([2; 32])),
                automatic: false,
                attestation: handle,
            },
        );

        assert_eq!(TransferState::AwaitingAttestation, t.state());
        assert_eq!(vec![tx], t.receipt.source_txs);
        assert_eq!(Some(handle), t.receipt.attestation.map(|a| a.handle));
    }

    #[test]
    fn request_defaults() {
        let r: TransferRequest = serde_json::from_str(
            r#"{
                "token": { "chain": "Solana", "address": "native" },
                "amount": "0.01",
                "source": "Solana",
                "destination": "Osmosis"
            }"#,
        )
        .unwrap();

        assert!(r.execute);
        assert!(!r.automatic);
        assert_eq!(None, r.recipient);
        assert!(r.token.is_native());
    }
}
