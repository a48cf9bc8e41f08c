use alloy_core::primitives::Address;

use crate::{
    confirm::{ConfirmationPolicy, wait_for_confirmation},
    error::DeployError,
    events::{EventSink, ProgressEvent},
    factory::FactoryRegistry,
    ledger::{DeploymentRecord, InFlight, Ledger},
    network::ActiveNetworks,
    plan::{ComponentSpec, DeploymentPlan, resolve_args},
    submitter::{SubmitError, Submitter},
};

/// Creates the components of a plan in order, skipping what the ledger already has.
pub struct DependencySequencer<'a, S, E> {
    submitter: &'a S,
    factories: &'a FactoryRegistry,
    events: &'a E,
    policy: ConfirmationPolicy,
}

impl<'a, S: Submitter, E: EventSink> DependencySequencer<'a, S, E> {
    pub fn new(submitter: &'a S, factories: &'a FactoryRegistry, events: &'a E) -> Self {
        Self {
            submitter,
            factories,
            events,
            policy: ConfirmationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deploy every component of `plan` that is not deployed yet.
    ///
    /// Stops at the first failure. Components confirmed before the failure stay deployed.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        networks: &ActiveNetworks,
        ledger: &mut Ledger,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        ledger.prepare(plan)?;

        for spec in plan.components() {
            if let Some(address) = ledger.deployed_address(&spec.name) {
                self.events.emit(ProgressEvent::ComponentSkipped {
                    name: spec.name.clone(),
                    address,
                });
                continue;
            }

            self.deploy(spec, networks, ledger).await?;
        }

        Ok(ledger.records_for(plan).into_iter().cloned().collect())
    }

    async fn deploy(
        &self,
        spec: &ComponentSpec,
        networks: &ActiveNetworks,
        ledger: &mut Ledger,
    ) -> Result<Address, DeployError> {
        let resumed = ledger.lookup(&spec.name).and_then(|r| r.in_flight.clone());

        let in_flight = match resumed {
            Some(in_flight) => {
                self.events.emit(ProgressEvent::Resuming {
                    subject: spec.name.clone(),
                    tx: in_flight.tx,
                });
                in_flight
            }
            None => self.submit(spec, networks, ledger).await?,
        };

        let receipt =
            match wait_for_confirmation(self.submitter, &spec.name, &in_flight.tx, &self.policy)
                .await
            {
                Ok(receipt) => receipt,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        component = %spec.name,
                        tx = %in_flight.tx,
                        "Creation still unconfirmed, it will be re-queried on the next run"
                    );
                    return Err(err);
                }
                Err(err) => return Err(self.fail(ledger, &spec.name, err)),
            };

        let Some(address) = receipt.contract_address.or(in_flight.address) else {
            let err = DeployError::SubmissionFailed {
                subject: spec.name.clone(),
                reason: "receipt carries no contract address".to_string(),
            };
            return Err(self.fail(ledger, &spec.name, err));
        };

        ledger.record_deployed(&spec.name, address, receipt.tx)?;
        self.events.emit(ProgressEvent::ComponentDeployed {
            name: spec.name.clone(),
            address,
            tx: receipt.tx,
        });

        Ok(address)
    }

    async fn submit(
        &self,
        spec: &ComponentSpec,
        networks: &ActiveNetworks,
        ledger: &mut Ledger,
    ) -> Result<InFlight, DeployError> {
        let args = resolve_args(&spec.args, ledger, networks, |dependency| {
            DeployError::UnresolvedDependency {
                component: spec.name.clone(),
                dependency: dependency.to_string(),
            }
        })?;
        let factory = self.factories.get(&spec.template)?;

        tracing::debug!(component = %spec.name, template = %spec.template, args = args.len(), "Submitting creation");

        let signed = match self.submitter.sign_create(factory, &args).await {
            Ok(signed) => signed,
            Err(err) => {
                let err = DeployError::SubmissionFailed {
                    subject: spec.name.clone(),
                    reason: err.to_string(),
                };
                return Err(self.fail(ledger, &spec.name, err));
            }
        };

        // Recorded before broadcast: from here on the transaction is only ever re-queried.
        let in_flight = InFlight {
            tx: signed.tx,
            address: signed.address,
        };
        ledger.record_submitted(&spec.name, args, in_flight.clone())?;

        match self.submitter.broadcast(&signed).await {
            Ok(()) => {}
            Err(SubmitError::Transport(reason)) => {
                tracing::warn!(
                    component = %spec.name,
                    tx = %signed.tx,
                    error = %reason,
                    "Broadcast outcome unknown, querying the transaction instead of resending"
                );
            }
            Err(err @ SubmitError::Rejected(_)) => {
                let err = DeployError::SubmissionFailed {
                    subject: spec.name.clone(),
                    reason: err.to_string(),
                };
                return Err(self.fail(ledger, &spec.name, err));
            }
        }

        let attempt = ledger.lookup(&spec.name).map_or(1, |r| r.attempts);
        self.events.emit(ProgressEvent::ComponentSubmitted {
            name: spec.name.clone(),
            tx: signed.tx,
            attempt,
        });

        Ok(in_flight)
    }

    /// Mark `name` failed and hand back the error that caused it.
    fn fail(&self, ledger: &mut Ledger, name: &str, err: DeployError) -> DeployError {
        let reason = err.to_string();
        if let Err(ledger_err) = ledger.record_failed(name, &reason) {
            tracing::error!(component = name, error = %ledger_err, "Failed to record failure");
            return ledger_err.into();
        }
        self.events.emit(ProgressEvent::ComponentFailed {
            name: name.to_string(),
            reason,
        });
        err
    }
}
