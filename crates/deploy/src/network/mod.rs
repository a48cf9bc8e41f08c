//! Per-network constant tables.
//!
//! A [`NetworkConfig`] is selected once at the start of a run and never mutated afterwards.
//! Every deployable network also names a counterpart network, whose cross-chain identifier
//! is consumed by components that listen to messages coming from it.

mod tables;

use std::{path::Path, str::FromStr};

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Context;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::DeployError,
    value::{ArgValue, format_bytes32_string},
};

/// Networks with a constant table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkId {
    Optimism,
    Avalanche,
    Fantom,
}

impl NetworkId {
    /// The constant table for this network.
    pub fn config(&self, production: bool) -> NetworkConfig {
        match self {
            NetworkId::Optimism => tables::optimism(production),
            NetworkId::Avalanche => tables::avalanche(production),
            NetworkId::Fantom => tables::fantom(production),
        }
    }
}

/// Which flavour of a network's table to use.
///
/// There is deliberately no default: the caller must say which one it wants.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Environment {
    Mainnet,
    Testnet,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Mainnet)
    }
}

/// Immutable bundle of network constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The network this table belongs to.
    pub network: NetworkId,
    /// Whether this is the production table.
    pub production: bool,
    /// EVM chain ID.
    pub chain_id: u64,
    /// LayerZero chain identifier of this network.
    pub lz_chain_id: u16,
    /// LayerZero endpoint deployed on this network.
    pub lz_endpoint: Address,
    /// Wrapped native asset.
    pub weth: Address,
    /// USDC deployment used by the redemption receiver.
    pub usdc: Address,
    /// Account receiving the initial mint.
    pub team_eoa: Address,
    /// Multisig that ends up owning every administrative role.
    pub team_multisig: Address,
    /// Airdrop merkle root, either 0x-prefixed hex or a short string.
    pub merkle_root: String,
    /// Tokens whitelisted in the voter on top of the native token.
    pub token_whitelist: Vec<Address>,
    /// Initial veNFT distribution recipients.
    pub partner_addrs: Vec<Address>,
    /// Initial veNFT distribution amounts, parallel to `partner_addrs`.
    pub partner_amts: Vec<U256>,
    /// Upper bound of the initial distribution.
    pub partner_max: U256,
    /// Network whose cross-chain messages this deployment listens to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<NetworkId>,
}

/// Select the constant table for a network identifier.
pub fn select(network_id: &str, production: bool) -> Result<NetworkConfig, DeployError> {
    let network = NetworkId::from_str(network_id)
        .map_err(|_| DeployError::UnknownNetwork(network_id.to_string()))?;
    Ok(network.config(production))
}

impl NetworkConfig {
    /// Merge field overrides from a TOML file on top of this table.
    ///
    /// The network identity (`network`, `production`) cannot be changed by an override.
    pub fn with_overrides(self, path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Network override file not found: {}", path.display());
        }

        let (network, production) = (self.network, self.production);
        let merged: Self = Figment::from(Serialized::defaults(&self))
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Failed to apply network overrides from {}", path.display()))?;

        if merged.network != network || merged.production != production {
            anyhow::bail!(
                "Network overrides in {} must not change the network identity",
                path.display()
            );
        }

        tracing::info!(path = %path.display(), network = %network, "Network overrides applied");
        Ok(merged)
    }

    fn merkle_root_word(&self) -> Result<B256, DeployError> {
        let invalid = |reason: String| DeployError::InvalidConfigValue {
            key: ConfigKey::MerkleRoot.to_string(),
            reason,
        };

        let root = self.merkle_root.as_str();
        if root.len() == 66 && root.starts_with("0x") {
            return B256::from_str(root).map_err(|e| invalid(e.to_string()));
        }
        format_bytes32_string(root).map_err(invalid)
    }
}

/// Named configuration values a plan may reference.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfigKey {
    Weth,
    Usdc,
    LzEndpoint,
    /// The counterpart network's LayerZero chain identifier.
    CounterpartLzChainId,
    MerkleRoot,
    TeamEoa,
    TeamMultisig,
    TokenWhitelist,
    PartnerAddrs,
    PartnerAmts,
    PartnerMax,
}

/// The configuration tables active for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveNetworks {
    pub primary: NetworkConfig,
    pub counterpart: NetworkConfig,
}

impl ActiveNetworks {
    /// Select the primary table and its counterpart, both from the same environment.
    pub fn select(network_id: &str, production: bool) -> Result<Self, DeployError> {
        let primary = select(network_id, production)?;
        Self::from_primary(primary)
    }

    /// Build the active set around an already selected (possibly overridden) primary table.
    pub fn from_primary(primary: NetworkConfig) -> Result<Self, DeployError> {
        let counterpart = primary
            .counterpart
            .ok_or_else(|| DeployError::MissingCounterpart {
                network: primary.network.to_string(),
            })?
            .config(primary.production);

        Ok(Self {
            primary,
            counterpart,
        })
    }

    /// Resolve a configuration key to a concrete argument.
    pub fn value(&self, key: ConfigKey) -> Result<ArgValue, DeployError> {
        let cfg = &self.primary;
        let value = match key {
            ConfigKey::Weth => ArgValue::Address(cfg.weth),
            ConfigKey::Usdc => ArgValue::Address(cfg.usdc),
            ConfigKey::LzEndpoint => ArgValue::Address(cfg.lz_endpoint),
            ConfigKey::CounterpartLzChainId => {
                ArgValue::Uint(U256::from(self.counterpart.lz_chain_id))
            }
            ConfigKey::MerkleRoot => ArgValue::Bytes32(cfg.merkle_root_word()?),
            ConfigKey::TeamEoa => ArgValue::Address(cfg.team_eoa),
            ConfigKey::TeamMultisig => ArgValue::Address(cfg.team_multisig),
            ConfigKey::TokenWhitelist => ArgValue::AddressArray(cfg.token_whitelist.clone()),
            ConfigKey::PartnerAddrs => ArgValue::AddressArray(cfg.partner_addrs.clone()),
            ConfigKey::PartnerAmts => ArgValue::UintArray(cfg.partner_amts.clone()),
            ConfigKey::PartnerMax => ArgValue::Uint(cfg.partner_max),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use tempdir::TempDir;

    #[test]
    fn test_select_known_network() {
        let config = select("optimism", true).expect("optimism is registered");
        assert_eq!(config.network, NetworkId::Optimism);
        assert!(config.production);
        assert_eq!(config.chain_id, 10);

        let test_config = select("optimism", false).expect("optimism is registered");
        assert!(!test_config.production);
        assert_ne!(config.chain_id, test_config.chain_id);
    }

    #[test]
    fn test_select_unknown_network() {
        let err = select("solana", true).unwrap_err();
        assert!(matches!(err, DeployError::UnknownNetwork(ref id) if id == "solana"));
    }

    #[test]
    fn test_tables_are_consistent() {
        for network in NetworkId::iter() {
            for production in [true, false] {
                let config = network.config(production);
                assert_eq!(config.network, network);
                assert_eq!(config.production, production);
                assert_eq!(
                    config.partner_addrs.len(),
                    config.partner_amts.len(),
                    "{network} partner schedule is not parallel"
                );
                let total = config
                    .partner_amts
                    .iter()
                    .fold(U256::ZERO, |acc, amount| acc + *amount);
                assert!(total <= config.partner_max, "{network} exceeds partner max");
                assert!(config.merkle_root_word().is_ok());
            }
        }
    }

    #[test]
    fn test_active_networks_counterpart() {
        let active = ActiveNetworks::select("avalanche", false).expect("avalanche is registered");
        assert_eq!(active.counterpart.network, NetworkId::Fantom);
        assert!(!active.counterpart.production);

        let value = active
            .value(ConfigKey::CounterpartLzChainId)
            .expect("counterpart chain id resolves");
        assert_eq!(
            value,
            ArgValue::Uint(U256::from(active.counterpart.lz_chain_id))
        );
    }

    #[test]
    fn test_network_without_counterpart() {
        let err = ActiveNetworks::select("fantom", true).unwrap_err();
        assert!(matches!(err, DeployError::MissingCounterpart { .. }));
    }

    #[test]
    fn test_merkle_root_hex_and_string() {
        let mut config = select("optimism", false).expect("registered");
        config.merkle_root = format!("0x{}", "ab".repeat(32));
        assert_eq!(config.merkle_root_word().expect("hex root")[0], 0xab);

        config.merkle_root = "x".repeat(40);
        assert!(matches!(
            config.merkle_root_word(),
            Err(DeployError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_with_overrides() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("overrides.toml");
        std::fs::write(
            &path,
            "team_multisig = \"0x000000000000000000000000000000000000dEaD\"\nmerkle_root = \"override-root\"\n",
        )
        .expect("Failed to write overrides");

        let base = select("optimism", false).expect("registered");
        let merged = base.clone().with_overrides(&path).expect("overrides apply");

        assert_eq!(merged.merkle_root, "override-root");
        assert_eq!(
            merged.team_multisig,
            Address::from_str("0x000000000000000000000000000000000000dEaD").expect("address")
        );
        assert_eq!(merged.weth, base.weth);
    }

    #[test]
    fn test_overrides_cannot_change_identity() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("overrides.toml");
        std::fs::write(&path, "production = true\n").expect("Failed to write overrides");

        let base = select("optimism", false).expect("registered");
        assert!(base.with_overrides(&path).is_err());
    }
}
