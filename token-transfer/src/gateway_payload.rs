//! JSON instructions for the IBC translator contract on Wormchain, carried as the application
//! payload of a transfer with payload. Binary fields are base64, the fee is a decimal string.

use std::fmt;

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

/// Bytes that travel as a base64 JSON string, like a cosmwasm `Binary`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64::encode(&self.0))
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        base64::decode(s).map(Binary).map_err(D::Error::custom)
    }
}

mod decimal_string {
    use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIbcTokenBridgePayload {
    /// Forward the tokens over IBC to `recipient` on `chain`.
    GatewayTransfer {
        chain: u16,
        /// The native (bech32) recipient string, as bytes.
        recipient: Binary,
        #[serde(with = "decimal_string")]
        fee: u128,
        nonce: u32,
    },
    /// Forward the tokens to `contract` on `chain` and execute it with `payload`.
    GatewayTransferWithPayload {
        chain: u16,
        contract: Binary,
        payload: Binary,
        nonce: u32,
    },
}

impl GatewayIbcTokenBridgePayload {
    pub fn transfer(chain: u16, recipient: &str, fee: u128, nonce: u32) -> Self {
        GatewayIbcTokenBridgePayload::GatewayTransfer {
            chain,
            recipient: Binary(recipient.as_bytes().to_vec()),
            fee,
            nonce,
        }
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(buf: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(buf)
    }
}
