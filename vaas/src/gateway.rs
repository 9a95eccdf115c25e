//! Governance of the wormchain gateway module, which routes token bridge transfers into IBC.

use crate::{
    payload::{module_name, read_address, read_governance_header, write_governance_header},
    Address, Chain, VaaError, WirePayload,
};

/// MODULE = "GatewayModule"
pub const MODULE: [u8; 32] = module_name(b"GatewayModule");

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Points the IBC composability middleware at a new translator contract.
    SetIbcComposabilityMwContract { contract: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GovernancePacket {
    pub chain: Chain,
    pub action: Action,
}

impl WirePayload for GovernancePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), VaaError> {
        match &self.action {
            Action::SetIbcComposabilityMwContract { contract } => {
                write_governance_header(buf, &MODULE, 3, self.chain);
                buf.extend_from_slice(&contract.0);
            }
        }

        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, VaaError> {
        let (action, chain, mut rdr) = read_governance_header(buf, &MODULE, "GatewayModule")?;

        let action = match action {
            3 => Action::SetIbcComposabilityMwContract {
                contract: read_address(&mut rdr, "middleware contract")?,
            },
            other => {
                return Err(VaaError::UnknownPayloadType {
                    expected: "a GatewayModule governance action",
                    found: format!("action {other}"),
                })
            }
        };

        Ok(GovernancePacket { chain, action })
    }
}
