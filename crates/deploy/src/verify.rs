//! Source verification of deployed components on a block explorer.
//!
//! Verification runs after the plan has finished and never changes the outcome of a run.

use std::{collections::HashMap, future::Future, path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    factory::{FactoryHandle, FactoryRegistry},
    ledger::{DeploymentRecord, RecordStatus},
    plan::DeploymentPlan,
    value::{ArgValue, encode_params},
};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("No factory known for `{0}`")]
    UnknownComponent(String),

    #[error("No build info for `{0}`, cannot assemble sources")]
    MissingBuildInfo(String),

    #[error("Failed to read build info {}: {reason}", .path.display())]
    BuildInfo { path: PathBuf, reason: String },

    #[error("Explorer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Explorer rejected `{name}`: {message}")]
    Rejected { name: String, message: String },
}

/// Submits a deployed component for source verification.
pub trait Verifier: Send + Sync {
    fn submit(
        &self,
        name: &str,
        address: Address,
        constructor_args: &[ArgValue],
    ) -> impl Future<Output = Result<(), VerificationError>> + Send;
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationSummary {
    pub verified: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl VerificationSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Submit every deployed record that is not verified yet.
///
/// Failures are logged and counted, never returned.
pub async fn verify_all<V: Verifier>(
    verifier: &V,
    records: &[DeploymentRecord],
) -> VerificationSummary {
    let mut summary = VerificationSummary::default();

    for record in records {
        let (RecordStatus::Deployed, Some(address)) = (record.status, record.address) else {
            continue;
        };
        if record.verified {
            tracing::debug!(component = %record.name, "Already verified");
            continue;
        }

        match verifier
            .submit(&record.name, address, &record.constructor_args)
            .await
        {
            Ok(()) => {
                tracing::info!(component = %record.name, address = %address, "Verification submitted");
                summary.verified.push(record.name.clone());
            }
            Err(err) => {
                tracing::warn!(component = %record.name, address = %address, error = %err, "Verification failed");
                summary.failed.push((record.name.clone(), err.to_string()));
            }
        }
    }

    summary
}

/// Hardhat build info: compiler version and the standard JSON input it was given.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_long_version: String,
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// Etherscan-compatible `verifysourcecode` client.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    /// Component name to the factory it was created from.
    factories: HashMap<String, FactoryHandle>,
}

impl EtherscanVerifier {
    pub fn new(
        api_url: Url,
        api_key: impl Into<String>,
        plan: &DeploymentPlan,
        registry: &FactoryRegistry,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let factories = plan
            .components()
            .iter()
            .filter_map(|spec| {
                registry
                    .get(&spec.template)
                    .ok()
                    .map(|handle| (spec.name.clone(), handle.clone()))
            })
            .collect();

        Ok(Self {
            client,
            api_url,
            api_key: api_key.into(),
            factories,
        })
    }

    fn load_build_info(
        name: &str,
        factory: &FactoryHandle,
    ) -> Result<BuildInfo, VerificationError> {
        let path = factory
            .build_info
            .as_ref()
            .ok_or_else(|| VerificationError::MissingBuildInfo(name.to_string()))?;
        let build_info_err = |reason: String| VerificationError::BuildInfo {
            path: path.clone(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| build_info_err(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| build_info_err(e.to_string()))
    }
}

impl Verifier for EtherscanVerifier {
    async fn submit(
        &self,
        name: &str,
        address: Address,
        constructor_args: &[ArgValue],
    ) -> Result<(), VerificationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| VerificationError::UnknownComponent(name.to_string()))?;
        let build_info = Self::load_build_info(name, factory)?;

        let form = [
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", address.to_string()),
            ("sourceCode", build_info.input.to_string()),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", factory.qualified_name()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            // Misspelled in the explorer API itself.
            ("constructorArguements", hex::encode(encode_params(constructor_args))),
        ];

        let response: ExplorerResponse = self
            .client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if response.status != "1" {
            let detail = response.result.as_str().unwrap_or_default();
            return Err(VerificationError::Rejected {
                name: name.to_string(),
                message: format!("{} {}", response.message, detail).trim().to_string(),
            });
        }

        tracing::debug!(component = name, guid = %response.result, "Verification accepted");
        Ok(())
    }
}
