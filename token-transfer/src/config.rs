//! Orchestrator configuration. Secrets never live here; signers are handed over per transfer.

use std::{collections::BTreeMap, path::Path, time::Duration};

use portal_supported_chains::Chain;
use portal_vaas::{signing::GuardianSetTable, token::ReservedBytes, Address, GuardianSetInfo};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub fn default_guardian_rpcs(&self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => &["https://api.wormholescan.io"],
            Network::Testnet => &["https://api.testnet.wormholescan.io"],
            Network::Devnet => &["http://localhost:7071"],
        }
    }

    /// Guardian sets known without configuration. Only the devnet guardian is fixed; mainnet and
    /// testnet sets rotate and must be configured.
    pub fn default_guardian_sets(&self) -> Vec<GuardianSetConfig> {
        match self {
            Network::Devnet => vec![GuardianSetConfig {
                index: 0,
                addresses: vec!["0xbeFA429d57cD18b7F8A4d91A2da9AB4AF05d0FBe".into()],
                expiration_time: 0,
            }],
            Network::Mainnet | Network::Testnet => Vec::new(),
        }
    }
}

/// A guardian set as written in configuration.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GuardianSetConfig {
    pub index: u32,
    /// Hex guardian addresses in signing order, optionally `0x` prefixed.
    pub addresses: Vec<String>,
    /// UNIX seconds after which the set stops verifying. 0 never expires.
    pub expiration_time: u64,
}

impl GuardianSetConfig {
    fn to_info(&self) -> Result<GuardianSetInfo, ConfigError> {
        let addresses = self
            .addresses
            .iter()
            .map(|a| {
                a.parse().map_err(|e| {
                    ConfigError::Invalid(format!(
                        "guardian address {a:?} in set {}: {e}",
                        self.index
                    ))
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(GuardianSetInfo {
            addresses,
            expiration_time: self.expiration_time,
        })
    }
}

/// Per chain settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChainConfig {
    /// Overrides the decimals the adapter reports for the native token.
    pub native_decimals: Option<u8>,
    pub token_bridge: Option<Address>,
    /// Allow the automatic relayer when the chain has one.
    pub automatic_relay: bool,
    pub bech32_prefix: Option<String>,
    /// IBC channel id on this chain for each counterparty chain.
    pub ibc_channels: BTreeMap<Chain, String>,
    /// Native address the signer for this chain must control.
    pub account: Option<String>,
    /// The IBC translator contract. Only meaningful on Wormchain.
    pub ibc_translator: Option<Address>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            native_decimals: None,
            token_bridge: None,
            automatic_relay: true,
            bech32_prefix: None,
            ibc_channels: BTreeMap::new(),
            account: None,
            ibc_translator: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfig {
    pub network: Network,
    pub attestation_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub reserved_bytes: ReservedBytes,
    /// Guardian RPC hosts. Empty means the defaults of `network`.
    pub guardian_rpcs: Vec<String>,
    /// Guardian sets attestations are verified against. Empty means the defaults of `network`.
    pub guardian_sets: Vec<GuardianSetConfig>,
    pub chains: BTreeMap<Chain, ChainConfig>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            network: Network::default(),
            attestation_timeout_ms: 600_000,
            poll_interval_ms: 5_000,
            reserved_bytes: ReservedBytes::default(),
            guardian_rpcs: Vec::new(),
            guardian_sets: Vec::new(),
            chains: BTreeMap::new(),
        }
    }
}

impl TransferConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: TransferConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.attestation_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "attestation_timeout_ms ({}) is shorter than poll_interval_ms ({})",
                self.attestation_timeout_ms, self.poll_interval_ms
            )));
        }

        for set in &self.guardian_sets {
            let info = set.to_info()?;
            if info.addresses.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "guardian set {} has no guardians",
                    set.index
                )));
            }
        }

        for (chain, cfg) in &self.chains {
            if let Some(channel) = cfg.ibc_channels.values().find(|c| c.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "empty IBC channel {channel:?} configured on {chain}"
                )));
            }
        }

        Ok(())
    }

    pub fn attestation_timeout(&self) -> Duration {
        Duration::from_millis(self.attestation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn guardian_rpcs(&self) -> Vec<String> {
        if self.guardian_rpcs.is_empty() {
            return self
                .network
                .default_guardian_rpcs()
                .iter()
                .map(|s| s.to_string())
                .collect();
        }

        self.guardian_rpcs.clone()
    }

    /// The guardian sets to verify attestations against. Fails when there are none, since no
    /// attestation could then be trusted.
    pub fn guardian_set_table(&self) -> Result<GuardianSetTable, ConfigError> {
        let sets = if self.guardian_sets.is_empty() {
            self.network.default_guardian_sets()
        } else {
            self.guardian_sets.clone()
        };

        if sets.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no guardian sets configured for {:?}",
                self.network
            )));
        }

        sets.iter()
            .map(|s| Ok((s.index, s.to_info()?)))
            .collect()
    }
}

/// Read-only view of per chain settings. Tests substitute their own instead of patching a live
/// context.
pub trait ChainConfigProvider: Send + Sync {
    fn chain_config(&self, chain: Chain) -> Option<&ChainConfig>;

    /// The channel on `from` that leads to `to`.
    fn ibc_channel(&self, from: Chain, to: Chain) -> Option<&str> {
        self.chain_config(from)?
            .ibc_channels
            .get(&to)
            .map(String::as_str)
    }
}

impl ChainConfigProvider for TransferConfig {
    fn chain_config(&self, chain: Chain) -> Option<&ChainConfig> {
        self.chains.get(&chain)
    }
}

/// A fixed set of chain settings, usually cloned from a [`TransferConfig`] and then overridden.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StaticChainConfigs {
    chains: BTreeMap<Chain, ChainConfig>,
}

impl StaticChainConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the settings for `chain`. Only this instance sees the change.
    pub fn with_override(mut self, chain: Chain, cfg: ChainConfig) -> Self {
        self.chains.insert(chain, cfg);
        self
    }
}

impl From<&TransferConfig> for StaticChainConfigs {
    fn from(cfg: &TransferConfig) -> Self {
        StaticChainConfigs {
            chains: cfg.chains.clone(),
        }
    }
}

impl ChainConfigProvider for StaticChainConfigs {
    fn chain_config(&self, chain: Chain) -> Option<&ChainConfig> {
        self.chains.get(&chain)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONFIG: &str = r#"
network: testnet
attestation_timeout_ms: 120000
reserved_bytes: strict
guardian_sets:
  - index: 0
    addresses:
      - "0x13947Bd48b18E53fdAeEe77F3473391aC727C638"
chains:
  Solana:
    native_decimals: 9
  Wormchain:
    bech32_prefix: wormhole
    ibc_channels:
      Osmosis: channel-3
  Osmosis:
    automatic_relay: false
    account: osmo1lwc58qfnwycw990cvq0yefnjqqvjgadlyaxdp6
"#;

    #[test]
    fn parse() {
        let cfg = TransferConfig::from_yaml_str(CONFIG).unwrap();

        assert_eq!(Network::Testnet, cfg.network);
        assert_eq!(Duration::from_secs(120), cfg.attestation_timeout());
        assert_eq!(Duration::from_secs(5), cfg.poll_interval());
        assert_eq!(ReservedBytes::Strict, cfg.reserved_bytes);
        assert_eq!(
            vec!["https://api.testnet.wormholescan.io".to_string()],
            cfg.guardian_rpcs()
        );

        let sets = cfg.guardian_set_table().unwrap();
        assert_eq!(
            "0x13947bd48b18e53fdaeee77f3473391ac727c638",
            sets.get(0).unwrap().addresses[0].to_string()
        );
        assert!(sets.get(1).is_none());

        let solana = cfg.chain_config(Chain::Solana).unwrap();
        assert_eq!(Some(9), solana.native_decimals);
        assert!(solana.automatic_relay);

        assert!(!cfg.chain_config(Chain::Osmosis).unwrap().automatic_relay);
        assert_eq!(
            Some("channel-3"),
            cfg.ibc_channel(Chain::Wormchain, Chain::Osmosis)
        );
        assert_eq!(None, cfg.ibc_channel(Chain::Wormchain, Chain::Kujira));
        assert_eq!(None, cfg.ibc_channel(Chain::Ethereum, Chain::Osmosis));
    }

    #[test]
    fn defaults() {
        let cfg = TransferConfig::from_yaml_str("{}").unwrap();
        assert_eq!(TransferConfig::default(), cfg);
        assert_eq!(Duration::from_secs(600), cfg.attestation_timeout());
        assert_eq!(ReservedBytes::Lenient, cfg.reserved_bytes);
        assert_eq!(
            vec!["https://api.wormholescan.io".to_string()],
            cfg.guardian_rpcs()
        );
    }

    #[test]
    fn guardian_sets_fail_closed() {
        assert!(matches!(
            TransferConfig::default().guardian_set_table(),
            Err(ConfigError::Invalid(_))
        ));

        let devnet = TransferConfig::from_yaml_str("network: devnet").unwrap();
        let sets = devnet.guardian_set_table().unwrap();
        assert_eq!(1, sets.get(0).unwrap().quorum());

        assert!(matches!(
            TransferConfig::from_yaml_str("guardian_sets:\n  - addresses: [\"0xzz\"]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TransferConfig::from_yaml_str("guardian_sets:\n  - index: 4"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            TransferConfig::from_yaml_str("poll_interval_ms: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TransferConfig::from_yaml_str("attestation_timeout_ms: 10\npoll_interval_ms: 20"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TransferConfig::from_yaml_str("network: moon"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            TransferConfig::from_file("/nonexistent/transfer.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn overrides_are_local() {
        let cfg = TransferConfig::from_yaml_str(CONFIG).unwrap();
        let mut wormchain = cfg.chain_config(Chain::Wormchain).unwrap().clone();
        wormchain
            .ibc_channels
            .insert(Chain::Osmosis, "channel-99".into());

        let overridden = StaticChainConfigs::from(&cfg).with_override(Chain::Wormchain, wormchain);

        assert_eq!(
            Some("channel-99"),
            overridden.ibc_channel(Chain::Wormchain, Chain::Osmosis)
        );
        assert_eq!(
            Some("channel-3"),
            cfg.ibc_channel(Chain::Wormchain, Chain::Osmosis)
        );
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = TransferConfig::from_yaml_str(CONFIG).unwrap();
        let s = serde_yaml::to_string(&cfg).unwrap();
        assert_eq!(cfg, TransferConfig::from_yaml_str(&s).unwrap());
    }
}
