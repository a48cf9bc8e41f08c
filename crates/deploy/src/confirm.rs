//! Waiting for submitted transactions to be confirmed.

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::{
    error::DeployError,
    submitter::{Confirmation, Receipt, SubmitError, Submitter, TxRef},
};

/// How long to wait for a confirmation and how often to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl ConfirmationPolicy {
    fn backoff(&self) -> ConstantBuilder {
        let polls = self.timeout.as_millis() / self.poll_interval.as_millis().max(1);
        ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(usize::try_from(polls).unwrap_or(usize::MAX).saturating_add(1))
    }
}

/// Why a confirmation query has to be asked again.
#[derive(Debug)]
enum Unsettled {
    Pending,
    Query(SubmitError),
}

/// Poll `tx` until it is confirmed, fails or the policy's timeout elapses.
///
/// Query errors are retried like a pending transaction: the transaction may well be
/// included, so giving up early would risk a second submission. On timeout the caller
/// keeps the transaction in flight and the next run asks again.
pub async fn wait_for_confirmation<S: Submitter>(
    submitter: &S,
    subject: &str,
    tx: &TxRef,
    policy: &ConfirmationPolicy,
) -> Result<Receipt, DeployError> {
    let query = move || async move {
        match submitter.confirm(tx).await {
            Ok(Confirmation::Pending) => Err(Unsettled::Pending),
            Ok(settled) => Ok(settled),
            Err(err) => Err(Unsettled::Query(err)),
        }
    };

    let polling = query
        .retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .notify(|unsettled: &Unsettled, _| {
            if let Unsettled::Query(err) = unsettled {
                tracing::warn!(subject, tx = %tx, error = %err, "Confirmation query failed, retrying");
            }
        });

    let timed_out = || DeployError::ConfirmationTimeout {
        subject: subject.to_string(),
        tx: *tx,
        waited: policy.timeout,
    };

    match tokio::time::timeout(policy.timeout, polling).await {
        Ok(Ok(Confirmation::Confirmed(receipt))) => {
            tracing::debug!(subject, tx = %tx, block = receipt.block_number, "Transaction confirmed");
            Ok(receipt)
        }
        Ok(Ok(Confirmation::Failed { reason })) => Err(DeployError::SubmissionFailed {
            subject: subject.to_string(),
            reason,
        }),
        Ok(Ok(Confirmation::Pending)) | Ok(Err(_)) | Err(_) => Err(timed_out()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{factory::FactoryHandle, submitter::SignedTx, value::ArgValue};
    use alloy_core::primitives::Address;
    use std::sync::Mutex;

    /// Answers confirmation queries from a script, then repeats the last answer.
    struct Scripted {
        answers: Mutex<Vec<Result<Confirmation, SubmitError>>>,
    }

    impl Scripted {
        fn new(mut answers: Vec<Result<Confirmation, SubmitError>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
            }
        }
    }

    impl Submitter for Scripted {
        async fn sign_create(
            &self,
            _: &FactoryHandle,
            _: &[ArgValue],
        ) -> Result<SignedTx, SubmitError> {
            unimplemented!()
        }

        async fn sign_call(
            &self,
            _: Address,
            _: &str,
            _: &[ArgValue],
        ) -> Result<SignedTx, SubmitError> {
            unimplemented!()
        }

        async fn broadcast(&self, _: &SignedTx) -> Result<(), SubmitError> {
            unimplemented!()
        }

        async fn confirm(&self, _: &TxRef) -> Result<Confirmation, SubmitError> {
            let mut answers = self.answers.lock().expect("lock");
            if answers.len() > 1 {
                answers.pop().expect("non-empty")
            } else {
                match answers.last().expect("non-empty") {
                    Ok(c) => Ok(c.clone()),
                    Err(e) => Err(SubmitError::Transport(e.to_string())),
                }
            }
        }
    }

    fn fast_policy() -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn receipt() -> Receipt {
        Receipt {
            tx: TxRef::default(),
            block_number: 42,
            contract_address: None,
        }
    }

    #[tokio::test]
    async fn test_confirms_after_pending_and_transport_errors() {
        let submitter = Scripted::new(vec![
            Ok(Confirmation::Pending),
            Err(SubmitError::Transport("connection reset".to_string())),
            Ok(Confirmation::Confirmed(receipt())),
        ]);

        let confirmed =
            wait_for_confirmation(&submitter, "Velo", &TxRef::default(), &fast_policy())
                .await
                .expect("eventually confirmed");
        assert_eq!(confirmed.block_number, 42);
    }

    #[tokio::test]
    async fn test_failed_transaction() {
        let submitter = Scripted::new(vec![Ok(Confirmation::Failed {
            reason: "reverted".to_string(),
        })]);

        let err = wait_for_confirmation(&submitter, "Velo", &TxRef::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::SubmissionFailed { ref reason, .. } if reason == "reverted"));
    }

    #[tokio::test]
    async fn test_times_out_while_pending() {
        let submitter = Scripted::new(vec![Ok(Confirmation::Pending)]);

        let err = wait_for_confirmation(&submitter, "Velo", &TxRef::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
