//! Provide Types and Data about the chains reachable through the portal token bridge.
//!
//! The registry is static. Every chain id assigned by the guardian network that this workspace
//! knows about is listed once in the `chains!` table below, together with the platform family
//! that determines how native addresses are encoded on that chain.

use std::{fmt, str::FromStr};

use serde::{
    de::{Error as DeError, Unexpected, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid chain: {0}")]
pub struct InvalidChainError(String);

/// The execution environment of a chain. Address formats and signing schemes are shared by every
/// chain on the same platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Evm,
    Solana,
    Cosmwasm,
    Sui,
    Aptos,
    Algorand,
    Near,
    Btc,
}

macro_rules! chains {
    ($($name:ident = $id:literal => $platform:ident,)*) => {
        /// Chain contains a mapping of supported chains to their u16 representation. These are
        /// universally defined among all bridge contracts.
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Chain {
            /// In the wire format, 0 indicates that a message is for any destination chain.
            #[default]
            Any,
            $($name,)*
            Unknown(u16),
        }

        impl Chain {
            /// Every registered chain in ascending id order. `Any` and `Unknown` are not included.
            pub const ALL: &'static [Chain] = &[$(Chain::$name,)*];

            /// The platform family of a registered chain.
            pub fn platform(&self) -> Option<Platform> {
                match self {
                    $(Chain::$name => Some(Platform::$platform),)*
                    Chain::Any | Chain::Unknown(_) => None,
                }
            }

            fn registered_name(&self) -> Option<&'static str> {
                match self {
                    Chain::Any => Some("Any"),
                    $(Chain::$name => Some(stringify!($name)),)*
                    Chain::Unknown(_) => None,
                }
            }

            fn from_registered_name(s: &str) -> Option<Chain> {
                if s.eq_ignore_ascii_case("any") {
                    return Some(Chain::Any);
                }
                $(
                    if s.eq_ignore_ascii_case(stringify!($name)) {
                        return Some(Chain::$name);
                    }
                )*
                None
            }
        }

        impl From<u16> for Chain {
            fn from(other: u16) -> Chain {
                match other {
                    0 => Chain::Any,
                    $($id => Chain::$name,)*
                    c => Chain::Unknown(c),
                }
            }
        }

        impl From<Chain> for u16 {
            fn from(other: Chain) -> u16 {
                match other {
                    Chain::Any => 0,
                    $(Chain::$name => $id,)*
                    Chain::Unknown(c) => c,
                }
            }
        }
    };
}

chains! {
    Solana = 1 => Solana,
    Ethereum = 2 => Evm,
    Terra = 3 => Cosmwasm,
    Bsc = 4 => Evm,
    Polygon = 5 => Evm,
    Avalanche = 6 => Evm,
    Oasis = 7 => Evm,
    Algorand = 8 => Algorand,
    Aurora = 9 => Evm,
    Fantom = 10 => Evm,
    Karura = 11 => Evm,
    Acala = 12 => Evm,
    Klaytn = 13 => Evm,
    Celo = 14 => Evm,
    Near = 15 => Near,
    Moonbeam = 16 => Evm,
    Neon = 17 => Evm,
    Terra2 = 18 => Cosmwasm,
    Injective = 19 => Cosmwasm,
    Osmosis = 20 => Cosmwasm,
    Sui = 21 => Sui,
    Aptos = 22 => Aptos,
    Arbitrum = 23 => Evm,
    Optimism = 24 => Evm,
    Gnosis = 25 => Evm,
    Pythnet = 26 => Solana,
    Xpla = 28 => Cosmwasm,
    Btc = 29 => Btc,
    Base = 30 => Evm,
    Sei = 32 => Cosmwasm,
    Rootstock = 33 => Evm,
    Scroll = 34 => Evm,
    Mantle = 35 => Evm,
    Blast = 36 => Evm,
    XLayer = 37 => Evm,
    Linea = 38 => Evm,
    Berachain = 39 => Evm,
    Wormchain = 3104 => Cosmwasm,
    Cosmoshub = 4000 => Cosmwasm,
    Evmos = 4001 => Cosmwasm,
    Kujira = 4002 => Cosmwasm,
    Neutron = 4003 => Cosmwasm,
    Celestia = 4004 => Cosmwasm,
    Stargaze = 4005 => Cosmwasm,
    Seda = 4006 => Cosmwasm,
    Dymension = 4007 => Cosmwasm,
    Provenance = 4008 => Cosmwasm,
    Sepolia = 10002 => Evm,
    ArbitrumSepolia = 10003 => Evm,
    BaseSepolia = 10004 => Evm,
    OptimismSepolia = 10005 => Evm,
    Holesky = 10006 => Evm,
    PolygonSepolia = 10007 => Evm,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registered_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown({})", u16::from(*self)),
        }
    }
}

impl FromStr for Chain {
    type Err = InvalidChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(c) = Chain::from_registered_name(s) {
            return Ok(c);
        }

        let id = s
            .strip_prefix("Unknown(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(s);

        id.parse::<u16>()
            .map(Chain::from)
            .map_err(|_| InvalidChainError(s.into()))
    }
}

impl Serialize for Chain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16((*self).into())
    }
}

struct ChainVisitor;

impl<'de> Visitor<'de> for ChainVisitor {
    type Value = Chain;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a chain id or a chain name")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        u16::try_from(v)
            .map(Chain::from)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        u16::try_from(v)
            .map(Chain::from)
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        v.parse().map_err(E::custom)
    }
}

// Human readable formats may carry either the numeric id or the name; binary formats only ever
// carry the id.
impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ChainVisitor)
        } else {
            deserializer.deserialize_u16(ChainVisitor)
        }
    }
}
