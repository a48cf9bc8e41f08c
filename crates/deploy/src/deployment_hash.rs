use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    network::ActiveNetworks,
    plan::{DeploymentPlan, WiringPlan},
};

/// Everything that decides what a run creates and how it wires it.
///
/// A ledger is bound to the hash of this value so that resuming with a changed plan or
/// changed network tables is noticed instead of silently mixing two deployments.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentConfigHash<'a> {
    pub plan: &'a DeploymentPlan,
    pub wiring: &'a WiringPlan,
    pub networks: &'a ActiveNetworks,
}

impl<'a> DeploymentConfigHash<'a> {
    pub fn new(
        plan: &'a DeploymentPlan,
        wiring: &'a WiringPlan,
        networks: &'a ActiveNetworks,
    ) -> Self {
        Self {
            plan,
            wiring,
            networks,
        }
    }

    /// SHA-256 over the JSON serialization, hex encoded.
    ///
    /// Field order is fixed by the struct definitions, so equal inputs hash equally.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;

        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(hex::encode(hasher.finalize()))
    }
}
