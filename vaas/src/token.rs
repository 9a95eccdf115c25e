//! Token bridge payloads. A transfer locks or burns tokens on the sending chain and emits one of
//! these messages; the receiving chain mints or releases the same amount once the VAA carrying it
//! has been signed. Also defines the governance actions the token bridge accepts.

use std::io::Cursor;

use bstr::BString;
use serde::{Deserialize, Serialize};

use crate::{
    payload::{
        module_name, read_address, read_array, read_chain, read_governance_header, read_rest,
        read_u8, write_governance_header, WirePayload,
    },
    require, Address, Amount, Chain, VaaError,
};

/// MODULE = "TokenBridge"
pub const MODULE: [u8; 32] = module_name(b"TokenBridge");

/// Length of everything in a transfer with payload that precedes the application payload.
pub const TRANSFER_WITH_PAYLOAD_HEADER_LEN: usize = 1 + 24 + 8 + 32 + 2 + 32 + 2 + 32;

/// How the 24 bytes between the payload id and the amount of a transfer with payload are treated
/// when decoding. They are the upper bytes of the on-wire uint256 amount and always zero for
/// amounts produced by this crate.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservedBytes {
    /// Ignore them.
    #[default]
    Lenient,
    /// Refuse payloads where any of them is non-zero.
    Strict,
}

/// A token transfer with an attached application payload for the receiving contract.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct TransferWithPayload {
    /// Amount in base units, normalized to at most 8 decimals.
    pub amount: u64,

    /// Address of the token on its native chain. Left-zero-padded if shorter than 32 bytes.
    pub token_address: Address,

    /// Native chain of the token.
    pub token_chain: Chain,

    /// Contract or account that receives the tokens and the payload.
    pub recipient: Address,

    pub recipient_chain: Chain,

    /// Logical sender, zero if unknown.
    pub sender_address: Address,

    /// Application defined. Opaque to the codec.
    pub payload: Vec<u8>,
}

/// Encodes a transfer with payload. Every multi-byte integer is big-endian and the reserved region
/// is written as zeros.
pub fn encode_transfer_payload(
    amount: u64,
    token_address: &Address,
    token_chain: Chain,
    recipient: &Address,
    recipient_chain: Chain,
    sender_address: &Address,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TRANSFER_WITH_PAYLOAD_HEADER_LEN + payload.len());
    buf.push(3);
    buf.extend_from_slice(&[0u8; 24]);
    buf.extend_from_slice(&amount.to_be_bytes());
    buf.extend_from_slice(&token_address.0);
    buf.extend_from_slice(&u16::from(token_chain).to_be_bytes());
    buf.extend_from_slice(&recipient.0);
    buf.extend_from_slice(&u16::from(recipient_chain).to_be_bytes());
    buf.extend_from_slice(&sender_address.0);
    buf.extend_from_slice(payload);
    buf
}

/// Decodes a transfer with payload. Fails with `MalformedPayload` when the buffer is shorter than
/// the fixed header or the payload id is not 3.
pub fn decode_transfer_payload(
    buf: &[u8],
    reserved: ReservedBytes,
) -> Result<TransferWithPayload, VaaError> {
    require!(
        buf.len() >= TRANSFER_WITH_PAYLOAD_HEADER_LEN,
        VaaError::MalformedPayload(format!(
            "transfer with payload is {} bytes, the fixed fields need {TRANSFER_WITH_PAYLOAD_HEADER_LEN}",
            buf.len()
        ))
    );
    require!(
        buf[0] == 3,
        VaaError::MalformedPayload(format!(
            "payload id {} is not a transfer with payload",
            buf[0]
        ))
    );

    let mut rdr = Cursor::new(&buf[1..]);
    let upper: [u8; 24] = read_array(&mut rdr, "reserved bytes")?;
    if reserved == ReservedBytes::Strict {
        require!(
            upper == [0u8; 24],
            VaaError::MalformedPayload("reserved bytes before the amount are not zero".into())
        );
    }

    let amount = u64::from_be_bytes(read_array(&mut rdr, "amount")?);
    let token_address = read_address(&mut rdr, "token address")?;
    let token_chain = read_chain(&mut rdr, "token chain")?;
    let recipient = read_address(&mut rdr, "recipient")?;
    let recipient_chain = read_chain(&mut rdr, "recipient chain")?;
    let sender_address = read_address(&mut rdr, "sender address")?;
    let payload = read_rest(&mut rdr);

    Ok(TransferWithPayload {
        amount,
        token_address,
        token_chain,
        recipient,
        recipient_chain,
        sender_address,
        payload,
    })
}

/// Represents a non-governance action targeted at the token bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Message {
    /// The Transfer message contains specifics detailing a token lock up on a sending chain.
    /// Chains that are attempting to initiate a transfer must lock up tokens in some manner, such
    /// as in a custody account or via burning, before emitting this message.
    Transfer {
        /// The amount to transfer.
        amount: Amount,

        /// Address of the token. Left-zero-padded if shorter than 32 bytes.
        token_address: Address,

        /// Chain ID of the token.
        token_chain: Chain,

        /// Address of the recipient. Left-zero-padded if shorter than 32 bytes.
        recipient: Address,

        /// Chain ID of the recipient.
        recipient_chain: Chain,

        /// Amount that the user is willing to pay as the relayer fee. Must be <= amount.
        fee: Amount,
    },

    /// Contains information about a token and its origin chain.
    AssetMeta {
        token_address: Address,
        token_chain: Chain,

        /// Number of decimals the token has on its origin chain.
        decimals: u8,

        /// Ticker symbol, at most 32 bytes.
        symbol: BString,

        /// Full token name, at most 32 bytes.
        name: BString,
    },

    TransferWithPayload(TransferWithPayload),
}

impl Message {
    pub fn id(&self) -> u8 {
        match self {
            Message::Transfer { .. } => 1,
            Message::AssetMeta { .. } => 2,
            Message::TransferWithPayload(_) => 3,
        }
    }

    /// Decodes any token bridge message, applying `reserved` to transfers with payload.
    pub fn decode_with(buf: &[u8], reserved: ReservedBytes) -> Result<Message, VaaError> {
        let id = *buf
            .first()
            .ok_or_else(|| VaaError::MalformedPayload("empty token bridge payload".into()))?;

        let mut rdr = Cursor::new(&buf[1..]);
        match id {
            1 => {
                let amount = Amount(read_array(&mut rdr, "amount")?);
                let token_address = read_address(&mut rdr, "token address")?;
                let token_chain = read_chain(&mut rdr, "token chain")?;
                let recipient = read_address(&mut rdr, "recipient")?;
                let recipient_chain = read_chain(&mut rdr, "recipient chain")?;
                let fee = Amount(read_array(&mut rdr, "fee")?);

                Ok(Message::Transfer {
                    amount,
                    token_address,
                    token_chain,
                    recipient,
                    recipient_chain,
                    fee,
                })
            }
            2 => {
                let token_address = read_address(&mut rdr, "token address")?;
                let token_chain = read_chain(&mut rdr, "token chain")?;
                let decimals = read_u8(&mut rdr, "decimals")?;
                let symbol: [u8; 32] = read_array(&mut rdr, "symbol")?;
                let name: [u8; 32] = read_array(&mut rdr, "name")?;

                Ok(Message::AssetMeta {
                    token_address,
                    token_chain,
                    decimals,
                    symbol: BString::from(trim_nul(&symbol)),
                    name: BString::from(trim_nul(&name)),
                })
            }
            3 => decode_transfer_payload(buf, reserved).map(Message::TransferWithPayload),
            other => Err(VaaError::UnknownPayloadType {
                expected: "a token bridge message",
                found: format!("payload id {other}"),
            }),
        }
    }
}

impl WirePayload for Message {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        match self {
            Message::Transfer {
                amount,
                token_address,
                token_chain,
                recipient,
                recipient_chain,
                fee,
            } => {
                buf.push(1);
                buf.extend_from_slice(&amount.0);
                buf.extend_from_slice(&token_address.0);
                buf.extend_from_slice(&u16::from(*token_chain).to_be_bytes());
                buf.extend_from_slice(&recipient.0);
                buf.extend_from_slice(&u16::from(*recipient_chain).to_be_bytes());
                buf.extend_from_slice(&fee.0);
            }
            Message::AssetMeta {
                token_address,
                token_chain,
                decimals,
                symbol,
                name,
            } => {
                buf.push(2);
                buf.extend_from_slice(&token_address.0);
                buf.extend_from_slice(&u16::from(*token_chain).to_be_bytes());
                buf.push(*decimals);
                buf.extend_from_slice(&pad_nul("symbol", symbol)?);
                buf.extend_from_slice(&pad_nul("name", name)?);
            }
            Message::TransferWithPayload(t) => {
                buf.extend_from_slice(&encode_transfer_payload(
                    t.amount,
                    &t.token_address,
                    t.token_chain,
                    &t.recipient,
                    t.recipient_chain,
                    &t.sender_address,
                    &t.payload,
                ));
            }
        }

        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        Message::decode_with(buf, ReservedBytes::default())
    }
}

// Symbols and names are right padded with NUL to 32 bytes.
fn pad_nul(field: &'static str, s: &[u8]) -> Result<[u8; 32], VaaError> {
    require!(
        s.len() <= 32,
        VaaError::FieldTooLong {
            field,
            len: s.len(),
            max: 32,
        }
    );

    let mut out = [0u8; 32];
    out[..s.len()].copy_from_slice(s);
    Ok(out)
}

fn trim_nul(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|&c| c != 0).unwrap_or(b.len());
    let end = b.iter().rposition(|&c| c != 0).map_or(start, |i| i + 1);
    &b[start..end]
}

/// Represents a governance action targeted at the token bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Registers an emitter address for a particular chain on a different chain. An emitter
    /// address for a particular chain must be registered on a destination chain before tokens can
    /// be transferred from the emitter chain to the destination chain. The accountant registers
    /// bridge endpoints with the same packet.
    RegisterChain {
        chain: Chain,
        emitter_address: Address,
    },

    /// Upgrades the token bridge contract to a new address.
    ContractUpgrade { new_contract: Address },
}

/// Represents the payload for a governance VAA targeted at the token bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GovernancePacket {
    /// The chain on which the governance action should be carried out.
    pub chain: Chain,

    /// The actual governance action to be carried out.
    pub action: Action,
}

impl WirePayload for GovernancePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        match &self.action {
            Action::RegisterChain {
                chain,
                emitter_address,
            } => {
                write_governance_header(buf, &MODULE, 1, self.chain);
                buf.extend_from_slice(&u16::from(*chain).to_be_bytes());
                buf.extend_from_slice(&emitter_address.0);
            }
            Action::ContractUpgrade { new_contract } => {
                write_governance_header(buf, &MODULE, 2, self.chain);
                buf.extend_from_slice(&new_contract.0);
            }
        }

        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        let (action, chain, mut rdr) = read_governance_header(buf, &MODULE, "TokenBridge")?;

        let action = match action {
            1 => Action::RegisterChain {
                chain: read_chain(&mut rdr, "registered chain")?,
                emitter_address: read_address(&mut rdr, "emitter address")?,
            },
            2 => Action::ContractUpgrade {
                new_contract: read_address(&mut rdr, "new contract")?,
            },
            other => {
                return Err(VaaError::UnknownPayloadType {
                    expected: "a TokenBridge governance action",
                    found: format!("action {other}"),
                })
            }
        };

        Ok(GovernancePacket { chain, action })
    }
}
