//! Orchestrator configuration.
//!
//! Values are layered: `Veloup.toml`, then `VELOUP_*` environment variables (nested keys
//! separated by `__`, e.g. `VELOUP_CONFIRMATION__TIMEOUT_SECS`), then command line flags.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{confirm::ConfirmationPolicy, network::Environment};

/// The default name for the veloup configuration file.
pub const VELOUP_CONFIG_FILENAME: &str = "Veloup.toml";

/// Prefix of the environment variables read into the configuration.
pub const VELOUP_ENV_PREFIX: &str = "VELOUP_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Upper bound on one confirmation wait.
    pub timeout_secs: u64,
    /// Delay between two receipt queries.
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            poll_interval_ms: 2_000,
        }
    }
}

impl ConfirmationConfig {
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Block explorer verification, off unless enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Everything needed to run the orchestrator against one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Network identifier, e.g. `optimism`.
    pub network: String,
    /// Which table of the network to use. Required, there is no default.
    pub environment: Environment,
    /// JSON-RPC endpoint of the target chain. Only needed to deploy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Account the node signs with. Only needed to deploy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Directory holding the compiled artifacts.
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    /// Ledger file. Defaults to `deployments/<network>-<environment>.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<PathBuf>,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    /// TOML file with field overrides for the network table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_overrides: Option<PathBuf>,
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_overrides: Option<PathBuf>,
}

impl OrchestratorConfig {
    /// Layer the configuration file, the environment and `overrides`.
    ///
    /// A missing configuration file is not an error; the other layers may be enough.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = Self::config_path(path);

        let config: Self = Figment::new()
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(VELOUP_ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .with_context(|| {
                format!(
                    "Failed to assemble configuration (file: {})",
                    config_path.display()
                )
            })?;

        tracing::debug!(
            network = %config.network,
            environment = %config.environment,
            rpc_url = ?config.rpc_url,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize veloup config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Veloup.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        let config_path = Self::config_path(path);
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    fn config_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(VELOUP_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        }
    }

    /// The RPC endpoint, which deploying cannot do without.
    pub fn require_rpc_url(&self) -> Result<&Url> {
        self.rpc_url
            .as_ref()
            .context("No rpc_url configured (Veloup.toml, VELOUP_RPC_URL or --rpc-url)")
    }

    /// The sending account, which deploying cannot do without.
    pub fn require_from(&self) -> Result<Address> {
        self.from
            .context("No sender account configured (Veloup.toml, VELOUP_FROM or --from)")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger.clone().unwrap_or_else(|| {
            PathBuf::from("deployments").join(format!("{}-{}.json", self.network, self.environment))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const MINIMAL: &str = r#"
network = "optimism"
environment = "testnet"
rpc_url = "http://127.0.0.1:8545/"
from = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
"#;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(VELOUP_CONFIG_FILENAME);
        std::fs::write(&path, MINIMAL).expect("Failed to write config");

        let config = OrchestratorConfig::load_from_file(temp_dir.path()).expect("valid config");
        assert_eq!(config.environment, Environment::Testnet);
        assert_eq!(config.artifacts, PathBuf::from("artifacts"));
        assert_eq!(config.confirmation, ConfirmationConfig::default());
        assert!(!config.verification.enabled);
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("deployments/optimism-testnet.json")
        );

        let saved = temp_dir.path().join("saved.toml");
        config.save_to_file(&saved).expect("Failed to save");
        let reloaded = OrchestratorConfig::load_from_file(&saved).expect("reloadable");
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(VELOUP_CONFIG_FILENAME);
        std::fs::write(&path, MINIMAL).expect("Failed to write config");

        let overrides = ConfigOverrides {
            network: Some("avalanche".to_string()),
            environment: Some(Environment::Mainnet),
            ledger: Some(PathBuf::from("custom.json")),
            ..Default::default()
        };
        let config = OrchestratorConfig::load(&path, &overrides).expect("valid config");

        assert_eq!(config.network, "avalanche");
        assert_eq!(config.environment, Environment::Mainnet);
        assert_eq!(config.ledger_path(), PathBuf::from("custom.json"));
        assert_eq!(
            config.require_rpc_url().map(Url::as_str).ok(),
            Some("http://127.0.0.1:8545/")
        );
    }

    #[test]
    fn test_chain_settings_only_needed_to_deploy() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(VELOUP_CONFIG_FILENAME);
        std::fs::write(&path, "network = \"optimism\"\nenvironment = \"testnet\"\n")
            .expect("Failed to write config");

        let config = OrchestratorConfig::load_from_file(&path).expect("enough for status");
        assert!(config.rpc_url.is_none());
        assert!(config.require_rpc_url().is_err());
        assert!(config.require_from().is_err());
    }

    #[test]
    fn test_environment_is_required() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(VELOUP_CONFIG_FILENAME);
        std::fs::write(
            &path,
            MINIMAL.replace("environment = \"testnet\"\n", ""),
        )
        .expect("Failed to write config");

        assert!(OrchestratorConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_confirmation_policy() {
        let policy = ConfirmationConfig {
            timeout_secs: 10,
            poll_interval_ms: 250,
        }
        .policy();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
    }
}
