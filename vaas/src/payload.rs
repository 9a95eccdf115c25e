//! The closed set of payload shapes a VAA body can carry, and the wire helpers shared by their
//! codecs.
//!
//! Each payload type owns its encoding through [`WirePayload`]. When a caller knows which shape a
//! VAA should carry it selects a [`PayloadKind`] and decodes with [`Payload::decode_as`]; a body
//! of a different shape is refused with `UnknownPayloadType` instead of being misread.

use std::{
    fmt,
    io::{Cursor, Read},
    str::FromStr,
};

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::{
    gateway, ibc_receiver, require,
    token::{self, ReservedBytes},
    Address, Chain, VaaError,
};

/// A payload with a fixed binary layout.
pub trait WirePayload: Sized {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError>;

    fn decode(buf: &[u8]) -> Result<Self, VaaError>;

    fn to_vec(&self) -> Result<Vec<u8>, VaaError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Opaque bytes. The payload is carried verbatim.
impl WirePayload for Vec<u8> {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        buf.extend_from_slice(self);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        Ok(buf.to_vec())
    }
}

/// Selects the schema a payload is decoded against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PayloadKind {
    TokenTransfer,
    AssetMeta,
    TransferWithPayload,
    RegisterChain,
    ContractUpgrade,
    UpdateChannelChain,
    SetIbcComposabilityMwContract,
    Raw,
}

const KIND_NAMES: [(PayloadKind, &str); 8] = [
    (PayloadKind::TokenTransfer, "TokenBridge:Transfer"),
    (PayloadKind::AssetMeta, "TokenBridge:AttestMeta"),
    (PayloadKind::TransferWithPayload, "TokenBridge:TransferWithPayload"),
    (PayloadKind::RegisterChain, "TokenBridge:RegisterChain"),
    (PayloadKind::ContractUpgrade, "TokenBridge:UpgradeContract"),
    (PayloadKind::UpdateChannelChain, "IbcBridge:ActionUpdateChannelChain"),
    (
        PayloadKind::SetIbcComposabilityMwContract,
        "GatewayGovernance:SetIbcComposabilityMwContract",
    ),
    (PayloadKind::Raw, "Uint8Array"),
];

impl PayloadKind {
    pub fn name(&self) -> &'static str {
        KIND_NAMES
            .iter()
            .find(|(k, _)| k == self)
            .map(|(_, n)| *n)
            .unwrap_or("Uint8Array")
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PayloadKind {
    type Err = VaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KIND_NAMES
            .iter()
            .find(|(_, n)| *n == s)
            .map(|(k, _)| *k)
            .ok_or_else(|| VaaError::UnknownPayloadType {
                expected: "a known payload kind",
                found: s.into(),
            })
    }
}

/// Every payload shape this crate understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    TokenBridge(token::Message),
    TokenBridgeGovernance(token::GovernancePacket),
    IbcReceiver(ibc_receiver::GovernancePacket),
    Gateway(gateway::GovernancePacket),
    Raw(Vec<u8>),
}

impl Payload {
    /// Decodes `buf` against `kind`, refusing payloads of any other shape.
    pub fn decode_as(
        kind: PayloadKind,
        buf: &[u8],
        reserved: ReservedBytes,
    ) -> Result<Payload, VaaError> {
        let payload = match kind {
            PayloadKind::Raw => return Ok(Payload::Raw(buf.to_vec())),
            PayloadKind::TokenTransfer
            | PayloadKind::AssetMeta
            | PayloadKind::TransferWithPayload => {
                Payload::TokenBridge(token::Message::decode_with(buf, reserved)?)
            }
            PayloadKind::RegisterChain | PayloadKind::ContractUpgrade => {
                Payload::TokenBridgeGovernance(token::GovernancePacket::decode(buf)?)
            }
            PayloadKind::UpdateChannelChain => {
                Payload::IbcReceiver(ibc_receiver::GovernancePacket::decode(buf)?)
            }
            PayloadKind::SetIbcComposabilityMwContract => {
                Payload::Gateway(gateway::GovernancePacket::decode(buf)?)
            }
        };

        let found = payload.kind();
        require!(
            found == kind,
            VaaError::UnknownPayloadType {
                expected: kind.name(),
                found: found.name().into(),
            }
        );

        Ok(payload)
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::TokenBridge(token::Message::Transfer { .. }) => PayloadKind::TokenTransfer,
            Payload::TokenBridge(token::Message::AssetMeta { .. }) => PayloadKind::AssetMeta,
            Payload::TokenBridge(token::Message::TransferWithPayload(_)) => {
                PayloadKind::TransferWithPayload
            }
            Payload::TokenBridgeGovernance(p) => match p.action {
                token::Action::RegisterChain { .. } => PayloadKind::RegisterChain,
                token::Action::ContractUpgrade { .. } => PayloadKind::ContractUpgrade,
            },
            Payload::IbcReceiver(_) => PayloadKind::UpdateChannelChain,
            Payload::Gateway(_) => PayloadKind::SetIbcComposabilityMwContract,
            Payload::Raw(_) => PayloadKind::Raw,
        }
    }
}

impl WirePayload for Payload {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        match self {
            Payload::TokenBridge(m) => m.encode(buf),
            Payload::TokenBridgeGovernance(p) => p.encode(buf),
            Payload::IbcReceiver(p) => p.encode(buf),
            Payload::Gateway(p) => p.encode(buf),
            Payload::Raw(r) => r.encode(buf),
        }
    }

    /// Without a kind to decode against, governance packets are recognised by their module name
    /// and token bridge messages by their payload id. A typed reading is only kept when it encodes
    /// back to exactly `buf`; anything else is kept as raw bytes so the body digest is preserved.
    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        let typed = if buf.len() >= 32 && buf[..32] == token::MODULE {
            token::GovernancePacket::decode(buf).map(Payload::TokenBridgeGovernance)
        } else if buf.len() >= 32 && buf[..32] == ibc_receiver::MODULE {
            ibc_receiver::GovernancePacket::decode(buf).map(Payload::IbcReceiver)
        } else if buf.len() >= 32 && buf[..32] == gateway::MODULE {
            gateway::GovernancePacket::decode(buf).map(Payload::Gateway)
        } else {
            token::Message::decode(buf).map(Payload::TokenBridge)
        };

        match typed {
            Ok(p) if p.to_vec().map_or(false, |b| b == buf) => Ok(p),
            _ => Ok(Payload::Raw(buf.to_vec())),
        }
    }
}

/// Builds a 32 byte module identifier, left padded with NUL.
pub(crate) const fn module_name(name: &[u8]) -> [u8; 32] {
    let mut m = [0u8; 32];
    let mut i = 0;
    while i < name.len() {
        m[32 - name.len() + i] = name[i];
        i += 1;
    }
    m
}

pub(crate) fn read_array<const N: usize>(
    rdr: &mut impl Read,
    field: &'static str,
) -> Result<[u8; N], VaaError> {
    let mut a = [0u8; N];
    rdr.read_exact(&mut a)
        .map_err(VaaError::short_payload(field))?;
    Ok(a)
}

pub(crate) fn read_address(rdr: &mut impl Read, field: &'static str) -> Result<Address, VaaError> {
    read_array::<32>(rdr, field).map(Address)
}

pub(crate) fn read_chain(rdr: &mut impl Read, field: &'static str) -> Result<Chain, VaaError> {
    rdr.read_u16::<BigEndian>()
        .map(Chain::from)
        .map_err(VaaError::short_payload(field))
}

pub(crate) fn read_u8(rdr: &mut impl Read, field: &'static str) -> Result<u8, VaaError> {
    rdr.read_u8().map_err(VaaError::short_payload(field))
}

pub(crate) fn read_rest(rdr: &mut Cursor<&[u8]>) -> Vec<u8> {
    let pos = rdr.position() as usize;
    let inner = rdr.get_ref();
    inner.get(pos..).map(<[u8]>::to_vec).unwrap_or_default()
}

pub(crate) fn write_governance_header(
    buf: &mut Vec<u8>,
    module: &[u8; 32],
    action: u8,
    chain: Chain,
) {
    buf.extend_from_slice(module);
    buf.push(action);
    buf.extend_from_slice(&u16::from(chain).to_be_bytes());
}

/// Checks the module name and returns the action id, the target chain and a reader positioned at
/// the action body.
pub(crate) fn read_governance_header<'a>(
    buf: &'a [u8],
    module: &[u8; 32],
    expected: &'static str,
) -> Result<(u8, Chain, Cursor<&'a [u8]>), VaaError> {
    let mut rdr = Cursor::new(buf);
    let found: [u8; 32] = read_array(&mut rdr, "governance module")?;
    require!(
        &found == module,
        VaaError::UnknownPayloadType {
            expected,
            found: String::from_utf8_lossy(&found)
                .trim_matches('\0')
                .to_string(),
        }
    );

    let action = read_u8(&mut rdr, "governance action")?;
    let chain = read_chain(&mut rdr, "governance chain")?;
    Ok((action, chain, rdr))
}
