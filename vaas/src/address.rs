//! Chain-agnostic 32 byte addresses and the per-platform parsers that produce them.

use std::{fmt, str::FromStr};

use bech32::{FromBase32, ToBase32, Variant};
use portal_supported_chains::{Chain, Platform};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid hex address: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid base58 address: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("invalid bech32 address: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("invalid address length {len} for {chain}")]
    Length { chain: Chain, len: usize },
    #[error("address is wider than 32 bytes ({0})")]
    TooLong(usize),
    #[error("{0} has no known native address format")]
    UnsupportedChain(Chain),
    #[error("a bech32 prefix is required to render addresses on {0}")]
    MissingPrefix(Chain),
}

/// Addresses are specified as 32 bytes on the wire. Addresses that are shorter, for example 20
/// byte Ethereum addresses, are left zero padded to 32.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0; 32]);

    /// Left-pads `bytes` to 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() > 32 {
            return Err(AddressError::TooLong(bytes.len()));
        }

        let mut a = [0u8; 32];
        a[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(Address(a))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Parses an address in the native format of `chain`.
    pub fn from_native(chain: Chain, s: &str) -> Result<Self, AddressError> {
        let platform = chain
            .platform()
            .ok_or(AddressError::UnsupportedChain(chain))?;

        let bytes = match platform {
            Platform::Evm => {
                let b = hex::decode(s.trim_start_matches("0x"))?;
                if b.len() != 20 {
                    return Err(AddressError::Length { chain, len: b.len() });
                }
                b
            }
            Platform::Solana => {
                let b = bs58::decode(s).into_vec()?;
                if b.len() != 32 {
                    return Err(AddressError::Length { chain, len: b.len() });
                }
                b
            }
            Platform::Cosmwasm => {
                let (_hrp, data, _variant) = bech32::decode(s)?;
                let b = Vec::<u8>::from_base32(&data)?;
                if b.len() != 20 && b.len() != 32 {
                    return Err(AddressError::Length { chain, len: b.len() });
                }
                b
            }
            Platform::Sui | Platform::Aptos | Platform::Algorand | Platform::Near | Platform::Btc => {
                let b = hex::decode(s.trim_start_matches("0x"))?;
                if b.len() != 32 {
                    return Err(AddressError::Length { chain, len: b.len() });
                }
                b
            }
        };

        Address::from_slice(&bytes)
    }

    /// Renders the address in the native format of `chain`. Cosmos chains need the bech32
    /// human-readable prefix, which is deployment configuration rather than registry data.
    pub fn to_native(&self, chain: Chain, bech32_prefix: Option<&str>) -> Result<String, AddressError> {
        let platform = chain
            .platform()
            .ok_or(AddressError::UnsupportedChain(chain))?;

        match platform {
            Platform::Evm => {
                if self.0[..12].iter().any(|&b| b != 0) {
                    return Err(AddressError::Length { chain, len: 32 });
                }
                Ok(format!("0x{}", hex::encode(&self.0[12..])))
            }
            Platform::Solana => Ok(bs58::encode(self.0).into_string()),
            Platform::Cosmwasm => {
                let hrp = bech32_prefix.ok_or(AddressError::MissingPrefix(chain))?;
                let data = if self.0[..12].iter().all(|&b| b == 0) {
                    &self.0[12..]
                } else {
                    &self.0[..]
                };
                Ok(bech32::encode(hrp, data.to_base32(), Variant::Bech32)?)
            }
            Platform::Sui | Platform::Aptos | Platform::Algorand | Platform::Near | Platform::Btc => {
                Ok(format!("0x{self}"))
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }

        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = hex::decode(s.trim_start_matches("0x"))?;
        Address::from_slice(&b)
    }
}

impl From<[u8; 32]> for Address {
    fn from(b: [u8; 32]) -> Self {
        Address(b)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
