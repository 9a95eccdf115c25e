//! Pure Rust primitives for the portal token bridge message format.
//!
//! This crate provides the chain-agnostic pieces every client of the bridge needs:
//!
//! - Universal 32 byte addresses and their native-format parsers.
//! - Binary codecs for token bridge payloads and governance packets.
//! - The VAA envelope: wire serialization and the double Keccak256 signing digest.
//! - Guardian signing and quorum verification.

pub mod address;
mod error;
pub mod gateway;
pub mod ibc_receiver;
pub mod payload;
pub mod signing;
pub mod token;
pub mod vaa;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use {
    address::{Address, AddressError},
    error::VaaError,
    payload::{Payload, PayloadKind, WirePayload},
    portal_supported_chains::Chain,
    vaa::Vaa,
};

/// The `GOVERNANCE_EMITTER` is a special address guardians trust to observe governance actions
/// from. The value is "0000000000000000000000000000000000000000000000000000000000000004".
pub const GOVERNANCE_EMITTER: Address = Address([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
]);

/// The Ethereum-style address of a guardian key: the last 20 bytes of the Keccak256 hash of the
/// uncompressed public key.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct GuardianAddress(pub [u8; 20]);

impl fmt::Display for GuardianAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }

        Ok(())
    }
}

impl FromStr for GuardianAddress {
    type Err = VaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut a = [0u8; 20];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut a)?;
        Ok(GuardianAddress(a))
    }
}

/// An amount as a uint256 encoded in big-endian order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub [u8; 32]);

impl Amount {
    /// Returns the value if it fits in a u128.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|&b| b != 0) {
            return None;
        }

        let mut lo = [0u8; 16];
        lo.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(lo))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount::from(u128::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        let mut a = [0u8; 32];
        a[16..].copy_from_slice(&v.to_be_bytes());
        Amount(a)
    }
}

/// A `GuardianSet` is a versioned set of keys that can sign messages.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardianSetInfo {
    /// Guardian addresses, indexed by the position used in VAA signatures.
    pub addresses: Vec<GuardianAddress>,

    /// UNIX time (seconds) after which this set no longer verifies VAAs. 0 never expires.
    #[serde(default)]
    pub expiration_time: u64,
}

impl GuardianSetInfo {
    /// Number of distinct guardian signatures required: more than two thirds of the set.
    ///
    /// An empty set still needs one signature, so it can never be satisfied.
    pub fn quorum(&self) -> usize {
        (self.addresses.len() * 2) / 3 + 1
    }
}
