use crate::{
    confirm::{ConfirmationPolicy, wait_for_confirmation},
    error::DeployError,
    events::{EventSink, ProgressEvent},
    ledger::{Ledger, StepStatus, WiringRecord},
    network::ActiveNetworks,
    plan::{WiringPlan, WiringStep, resolve_args},
    submitter::{SubmitError, Submitter, TxRef},
};

/// Applies wiring steps strictly in order once every component is deployed.
pub struct WiringSequencer<'a, S, E> {
    submitter: &'a S,
    events: &'a E,
    policy: ConfirmationPolicy,
}

impl<'a, S: Submitter, E: EventSink> WiringSequencer<'a, S, E> {
    pub fn new(submitter: &'a S, events: &'a E) -> Self {
        Self {
            submitter,
            events,
            policy: ConfirmationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply every step of `wiring` that is not applied yet.
    ///
    /// Nothing is submitted unless every component the steps touch is deployed.
    pub async fn run(
        &self,
        wiring: &WiringPlan,
        ledger: &mut Ledger,
        networks: &ActiveNetworks,
    ) -> Result<Vec<WiringRecord>, DeployError> {
        Self::check_deployed(wiring, ledger)?;
        ledger.prepare_wiring(wiring)?;

        for step in wiring.steps() {
            let applied = ledger
                .step(&step.id)
                .is_some_and(|r| r.status == StepStatus::Applied);
            if applied {
                self.events.emit(ProgressEvent::StepSkipped {
                    id: step.id.clone(),
                });
                continue;
            }

            self.apply(step, ledger, networks).await?;
        }

        Ok(ledger.steps_for(wiring).into_iter().cloned().collect())
    }

    fn check_deployed(wiring: &WiringPlan, ledger: &Ledger) -> Result<(), DeployError> {
        for step in wiring.steps() {
            if let Some(missing) = step
                .components()
                .find(|name| ledger.deployed_address(name).is_none())
            {
                return Err(DeployError::PlanIntegrity(format!(
                    "wiring step `{}` needs `{}`, which is not deployed",
                    step.id, missing
                )));
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        step: &WiringStep,
        ledger: &mut Ledger,
        networks: &ActiveNetworks,
    ) -> Result<(), DeployError> {
        let tx = match ledger.step(&step.id).and_then(|r| r.in_flight) {
            Some(tx) => {
                self.events.emit(ProgressEvent::Resuming {
                    subject: step.id.clone(),
                    tx,
                });
                tx
            }
            None => self.submit(step, ledger, networks).await?,
        };

        match wait_for_confirmation(self.submitter, &step.id, &tx, &self.policy).await {
            Ok(receipt) => {
                ledger.step_applied(&step.id, receipt.tx)?;
                self.events.emit(ProgressEvent::StepApplied {
                    id: step.id.clone(),
                    tx: receipt.tx,
                });
                Ok(())
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(step = %step.id, tx = %tx, "Step still unconfirmed, it will be re-queried on the next run");
                Err(err)
            }
            Err(err) => Err(self.fail(ledger, &step.id, err)),
        }
    }

    async fn submit(
        &self,
        step: &WiringStep,
        ledger: &mut Ledger,
        networks: &ActiveNetworks,
    ) -> Result<TxRef, DeployError> {
        let not_deployed = |name: &str| {
            DeployError::PlanIntegrity(format!(
                "wiring step `{}` needs `{}`, which is not deployed",
                step.id, name
            ))
        };
        let args = resolve_args(&step.args, ledger, networks, not_deployed)?;
        let target = ledger
            .deployed_address(&step.target)
            .ok_or_else(|| not_deployed(&step.target))?;

        tracing::debug!(step = %step.id, target = %target, args = args.len(), "Submitting call");

        let signed = match self.submitter.sign_call(target, &step.operation, &args).await {
            Ok(signed) => signed,
            Err(err) => {
                let err = DeployError::SubmissionFailed {
                    subject: step.id.clone(),
                    reason: err.to_string(),
                };
                return Err(self.fail(ledger, &step.id, err));
            }
        };
        let tx = signed.tx;

        // Recorded before broadcast: from here on the transaction is only ever re-queried.
        ledger.step_submitted(&step.id, args, tx)?;

        match self.submitter.broadcast(&signed).await {
            Ok(()) => {}
            Err(SubmitError::Transport(reason)) => {
                tracing::warn!(
                    step = %step.id,
                    tx = %tx,
                    error = %reason,
                    "Broadcast outcome unknown, querying the transaction instead of resending"
                );
            }
            Err(err @ SubmitError::Rejected(_)) => {
                let err = DeployError::SubmissionFailed {
                    subject: step.id.clone(),
                    reason: err.to_string(),
                };
                return Err(self.fail(ledger, &step.id, err));
            }
        }

        self.events.emit(ProgressEvent::StepSubmitted {
            id: step.id.clone(),
            tx,
        });

        Ok(tx)
    }

    fn fail(&self, ledger: &mut Ledger, id: &str, err: DeployError) -> DeployError {
        let reason = err.to_string();
        if let Err(ledger_err) = ledger.step_failed(id, &reason) {
            tracing::error!(step = id, error = %ledger_err, "Failed to record failure");
            return ledger_err.into();
        }
        self.events.emit(ProgressEvent::StepFailed {
            id: id.to_string(),
            reason,
        });
        err
    }
}
