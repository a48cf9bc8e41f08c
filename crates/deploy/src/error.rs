//! Error taxonomy for the orchestration core.

use std::time::Duration;

use thiserror::Error;

use crate::{factory::FactoryError, ledger::LedgerError, submitter::TxRef};

/// Errors that stop an orchestration run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Network {network} has no counterpart network configured")]
    MissingCounterpart { network: String },

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("Component `{component}` depends on `{dependency}`, which is not deployed")]
    UnresolvedDependency {
        component: String,
        dependency: String,
    },

    #[error("Plan integrity violated: {0}")]
    PlanIntegrity(String),

    #[error("Confirmation of {tx} for `{subject}` timed out after {waited:?}")]
    ConfirmationTimeout {
        subject: String,
        tx: TxRef,
        waited: Duration,
    },

    #[error("Submission for `{subject}` failed: {reason}")]
    SubmissionFailed { subject: String, reason: String },

    #[error(
        "Ledger fingerprint {found} does not match the current plan ({expected}); pass --force to resume anyway"
    )]
    FingerprintMismatch { expected: String, found: String },

    #[error("Invalid configuration value `{key}`: {reason}")]
    InvalidConfigValue { key: String, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl DeployError {
    /// Whether re-running the orchestrator can make progress without changing the plan.
    ///
    /// Timeouts are resolved by re-querying the in-flight transaction on the next run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeployError::ConfirmationTimeout { .. })
    }

    /// Whether the error points at a malformed plan rather than a runtime condition.
    pub fn is_plan_defect(&self) -> bool {
        matches!(
            self,
            DeployError::UnresolvedDependency { .. } | DeployError::PlanIntegrity(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = DeployError::ConfirmationTimeout {
            subject: "Velo".to_string(),
            tx: TxRef::default(),
            waited: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_plan_defect());

        let failed = DeployError::SubmissionFailed {
            subject: "Velo".to_string(),
            reason: "reverted".to_string(),
        };
        assert!(!failed.is_retryable());

        let unresolved = DeployError::UnresolvedDependency {
            component: "Router".to_string(),
            dependency: "PairFactory".to_string(),
        };
        assert!(unresolved.is_plan_defect());
        assert!(!unresolved.is_retryable());
    }
}
