//! Ties network selection, the ledger and both sequencers into one run.

use anyhow::{Context, Result};

use crate::{
    config::OrchestratorConfig,
    confirm::ConfirmationPolicy,
    deployment_hash::DeploymentConfigHash,
    error::DeployError,
    events::{EventSink, TracingSink},
    factory::{ArtifactFactoryProvider, FactoryRegistry},
    ledger::{Ledger, LedgerError},
    network::{ActiveNetworks, select},
    plan::{DeploymentPlan, WiringPlan, standard},
    report::DeploymentReport,
    sequencer::{DependencySequencer, WiringSequencer},
    submitter::{JsonRpcSubmitter, Submitter},
    verify::{EtherscanVerifier, Verifier, verify_all},
};

/// Runs a plan and its wiring against one ledger.
pub struct Orchestrator<'a, S, E> {
    submitter: &'a S,
    events: &'a E,
    policy: ConfirmationPolicy,
    force: bool,
}

impl<'a, S: Submitter, E: EventSink> Orchestrator<'a, S, E> {
    pub fn new(submitter: &'a S, events: &'a E) -> Self {
        Self {
            submitter,
            events,
            policy: ConfirmationPolicy::default(),
            force: false,
        }
    }

    pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resume a ledger even if it was written for a different plan or network table.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Deploy every component, then apply every wiring step.
    ///
    /// The ledger is bound to the fingerprint of the inputs before anything is submitted.
    pub async fn run(
        &self,
        factories: &FactoryRegistry,
        plan: &DeploymentPlan,
        wiring: &WiringPlan,
        networks: &ActiveNetworks,
        ledger: &mut Ledger,
    ) -> Result<(), DeployError> {
        wiring.check_against(plan)?;

        let fingerprint = DeploymentConfigHash::new(plan, wiring, networks)
            .compute_hash()
            .map_err(LedgerError::from)?;
        ledger.bind_fingerprint(&fingerprint, self.force)?;

        tracing::info!(
            network = %networks.primary.network,
            production = networks.primary.production,
            components = plan.len(),
            steps = wiring.len(),
            "Deploying components..."
        );
        DependencySequencer::new(self.submitter, factories, self.events)
            .with_policy(self.policy)
            .run(plan, networks, ledger)
            .await?;

        tracing::info!("Applying wiring steps...");
        WiringSequencer::new(self.submitter, self.events)
            .with_policy(self.policy)
            .run(wiring, ledger, networks)
            .await?;

        Ok(())
    }
}

/// Select the network tables for `config`, applying overrides when configured.
pub fn active_networks(config: &OrchestratorConfig) -> Result<ActiveNetworks> {
    let mut primary = select(&config.network, config.environment.is_production())?;
    if let Some(path) = &config.network_overrides {
        primary = primary.with_overrides(path)?;
    }
    Ok(ActiveNetworks::from_primary(primary)?)
}

/// Run the standard plan as described by `config`.
///
/// Returns a report whenever the ledger could be opened, including for failed runs; the
/// report carries the error. Errors before that point are returned directly and leave
/// the ledger untouched.
pub async fn deploy(config: &OrchestratorConfig, force: bool) -> Result<DeploymentReport> {
    tracing::info!("Starting deployment process...");

    let networks = active_networks(config)?;
    let plan = standard::deployment_plan()?;
    let wiring = standard::wiring_plan()?;

    let submitter = JsonRpcSubmitter::new(
        config.require_rpc_url()?.clone(),
        config.require_from()?,
        crate::rpc::DEFAULT_TIMEOUT,
    )
    .context("Failed to create RPC client")?;

    let provider = ArtifactFactoryProvider::new(&config.artifacts);
    let factories = FactoryRegistry::resolve_all(&provider, &plan)
        .await
        .with_context(|| {
            format!(
                "Failed to resolve artifacts under {}",
                config.artifacts.display()
            )
        })?;

    let ledger_path = config.ledger_path();
    let mut ledger = Ledger::open(&ledger_path)
        .with_context(|| format!("Failed to open ledger {}", ledger_path.display()))?;

    let outcome = Orchestrator::new(&submitter, &TracingSink)
        .with_policy(config.confirmation.policy())
        .force(force)
        .run(&factories, &plan, &wiring, &networks, &mut ledger)
        .await;

    let report = DeploymentReport::from_ledger(&ledger, &plan, &wiring);
    let report = match outcome {
        Ok(()) => report,
        Err(err) => {
            tracing::error!(error = %err, retryable = err.is_retryable(), "Deployment stopped");
            return Ok(report.with_error(err));
        }
    };

    tracing::info!("Deployment complete");

    let Some(verifier) = explorer_verifier(config, &plan, &factories) else {
        return Ok(report);
    };
    Ok(verify_deployment(&verifier, &mut ledger, report).await)
}

/// The configured explorer client, if verification is enabled and can be set up.
fn explorer_verifier(
    config: &OrchestratorConfig,
    plan: &DeploymentPlan,
    factories: &FactoryRegistry,
) -> Option<EtherscanVerifier> {
    if !config.verification.enabled {
        return None;
    }

    let Some(api_url) = config.verification.api_url.clone() else {
        tracing::warn!("Verification enabled without an api_url, skipping");
        return None;
    };

    let api_key = config.verification.api_key.clone().unwrap_or_default();
    match EtherscanVerifier::new(api_url, api_key, plan, factories) {
        Ok(verifier) => Some(verifier),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to create verification client, skipping");
            None
        }
    }
}

/// Verify what the run deployed. Never turns a finished deployment into a failure.
async fn verify_deployment<V: Verifier>(
    verifier: &V,
    ledger: &mut Ledger,
    report: DeploymentReport,
) -> DeploymentReport {
    let summary = verify_all(verifier, &report.components).await;
    for name in &summary.verified {
        if let Err(err) = ledger.record_verified(name) {
            tracing::warn!(component = %name, error = %err, "Failed to record verification");
        }
    }
    report.with_verification(summary)
}

/// Report the ledger state for `config` without submitting anything.
pub fn status(config: &OrchestratorConfig) -> Result<DeploymentReport> {
    // Selecting the tables first rejects unknown networks before the ledger is touched.
    active_networks(config)?;

    let plan = standard::deployment_plan()?;
    let wiring = standard::wiring_plan()?;

    let ledger_path = config.ledger_path();
    if !ledger_path.exists() {
        anyhow::bail!("No ledger at {}, nothing deployed yet", ledger_path.display());
    }
    let ledger = Ledger::open(&ledger_path)
        .with_context(|| format!("Failed to open ledger {}", ledger_path.display()))?;

    Ok(DeploymentReport::from_ledger(&ledger, &plan, &wiring))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::VerificationConfig, network::Environment, plan::ComponentSpec,
        submitter::TxRef, value::ArgValue, verify::VerificationError,
    };
    use alloy_core::primitives::Address;

    /// Rejects every submission.
    struct Offline;

    impl Verifier for Offline {
        async fn submit(
            &self,
            name: &str,
            _address: Address,
            _args: &[ArgValue],
        ) -> Result<(), VerificationError> {
            Err(VerificationError::Rejected {
                name: name.to_string(),
                message: "explorer unreachable".to_string(),
            })
        }
    }

    struct Accepting;

    impl Verifier for Accepting {
        async fn submit(
            &self,
            _name: &str,
            _address: Address,
            _args: &[ArgValue],
        ) -> Result<(), VerificationError> {
            Ok(())
        }
    }

    fn deployed() -> (Ledger, DeploymentReport) {
        let plan = DeploymentPlan::new(vec![ComponentSpec::new("Velo")]).expect("valid plan");
        let wiring = WiringPlan::new(Vec::new()).expect("empty wiring");
        let mut ledger = Ledger::in_memory();
        ledger.prepare(&plan).expect("prepare");
        ledger
            .record_deployed("Velo", Address::repeat_byte(1), TxRef::default())
            .expect("deploy");
        let report = DeploymentReport::from_ledger(&ledger, &plan, &wiring);
        (ledger, report)
    }

    fn config(verification: VerificationConfig) -> OrchestratorConfig {
        OrchestratorConfig {
            network: "optimism".to_string(),
            environment: Environment::Testnet,
            rpc_url: None,
            from: None,
            artifacts: "artifacts".into(),
            ledger: None,
            confirmation: Default::default(),
            verification,
            network_overrides: None,
        }
    }

    #[tokio::test]
    async fn test_verification_failure_keeps_deployment_complete() {
        let (mut ledger, report) = deployed();
        assert!(report.is_complete());

        let report = verify_deployment(&Offline, &mut ledger, report).await;
        assert!(report.is_complete());
        assert_eq!(report.verification.map(|s| s.failed.len()), Some(1));
        assert!(ledger.lookup("Velo").is_some_and(|r| !r.verified));
    }

    #[tokio::test]
    async fn test_verification_is_recorded() {
        let (mut ledger, report) = deployed();
        let report = verify_deployment(&Accepting, &mut ledger, report).await;

        assert!(report.verification.is_some_and(|s| s.is_clean()));
        assert!(ledger.lookup("Velo").is_some_and(|r| r.verified));
    }

    #[test]
    fn test_explorer_verifier_is_optional() {
        let plan = DeploymentPlan::new(vec![ComponentSpec::new("Velo")]).expect("valid plan");
        let factories = FactoryRegistry::from_handles(Vec::new());

        let disabled = config(VerificationConfig::default());
        assert!(explorer_verifier(&disabled, &plan, &factories).is_none());

        let no_url = VerificationConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(explorer_verifier(&config(no_url), &plan, &factories).is_none());

        let complete = VerificationConfig {
            enabled: true,
            api_url: Some(
                "https://api-optimistic.etherscan.io/api"
                    .parse()
                    .expect("valid url"),
            ),
            api_key: Some("key".to_string()),
        };
        assert!(explorer_verifier(&config(complete), &plan, &factories).is_some());
    }
}
