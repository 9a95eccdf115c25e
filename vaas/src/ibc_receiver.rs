use crate::{
    payload::{module_name, read_array, read_chain, read_governance_header, write_governance_header},
    require, Chain, VaaError, WirePayload,
};

/// Represents a governance action targeted at the wormchain ibc receiver contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    UpdateChannelChain {
        // an existing IBC channel ID, left padded with NUL
        channel_id: [u8; 64],
        // the chain associated with this IBC channel_id
        chain_id: Chain,
    },
}

/// MODULE = "IbcReceiver"
pub const MODULE: [u8; 32] = module_name(b"IbcReceiver");

/// Represents the payload for a governance VAA targeted at the wormchain ibc receiver contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GovernancePacket {
    /// Describes the chain on which the governance action should be carried out.
    pub chain: Chain,

    /// The actual governance action to be carried out.
    pub action: Action,
}

impl GovernancePacket {
    /// Associates the IBC channel named `channel` (for example "channel-0") with `chain_id`.
    pub fn update_channel_chain(channel: &str, chain_id: Chain) -> Result<Self, VaaError> {
        Ok(GovernancePacket {
            chain: Chain::Wormchain,
            action: Action::UpdateChannelChain {
                channel_id: channel_id(channel)?,
                chain_id,
            },
        })
    }
}

/// Left pads an IBC channel name to the 64 byte wire field.
pub fn channel_id(channel: &str) -> Result<[u8; 64], VaaError> {
    let b = channel.as_bytes();
    require!(
        b.len() <= 64,
        VaaError::FieldTooLong {
            field: "channel id",
            len: b.len(),
            max: 64,
        }
    );

    let mut id = [0u8; 64];
    id[64 - b.len()..].copy_from_slice(b);
    Ok(id)
}

/// The channel name stored in a 64 byte wire field, without padding.
pub fn channel_name(channel_id: &[u8; 64]) -> String {
    String::from_utf8_lossy(channel_id)
        .trim_start_matches('\0')
        .to_string()
}

impl WirePayload for GovernancePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        // The wire format encodes the action before the chain and then appends the actual action
        // payload.
        match &self.action {
            Action::UpdateChannelChain {
                channel_id,
                chain_id,
            } => {
                write_governance_header(buf, &MODULE, 1, self.chain);
                buf.extend_from_slice(channel_id);
                buf.extend_from_slice(&u16::from(*chain_id).to_be_bytes());
            }
        }

        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        let (action, chain, mut rdr) = read_governance_header(buf, &MODULE, "IbcReceiver")?;

        let action = match action {
            1 => Action::UpdateChannelChain {
                channel_id: read_array(&mut rdr, "channel id")?,
                chain_id: read_chain(&mut rdr, "channel chain")?,
            },
            other => {
                return Err(VaaError::UnknownPayloadType {
                    expected: "an IbcReceiver governance action",
                    found: format!("action {other}"),
                })
            }
        };

        Ok(GovernancePacket { chain, action })
    }
}
