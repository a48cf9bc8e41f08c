//! The "submit and confirm" capability consumed by the sequencers.

mod json_rpc;

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, B256, Bytes};
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use json_rpc::JsonRpcSubmitter;

use crate::{factory::FactoryHandle, value::ArgValue};

/// Reference to a submitted transaction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Deref, From,
)]
#[serde(transparent)]
pub struct TxRef(pub B256);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a creation submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Creation {
    /// Address the component will live at once the transaction is included.
    pub address: Address,
    pub tx: TxRef,
}

/// A signed transaction that has not been broadcast yet.
///
/// Its hash is fixed by the signature, so it can be recorded before anything reaches the
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx: TxRef,
    pub raw: Bytes,
    /// Where a creation lands once included. `None` for calls.
    pub address: Option<Address>,
}

/// Inclusion details of a confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx: TxRef,
    pub block_number: u64,
    /// Set for creation transactions.
    pub contract_address: Option<Address>,
}

/// Outcome of a confirmation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(Receipt),
    Pending,
    Failed { reason: String },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The network refused the transaction.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The request could not be delivered or answered.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Abstract submit-and-confirm capability.
///
/// Implementations send transactions on behalf of an account they already control; key
/// custody is out of scope. Submission is split into signing and broadcasting so the
/// transaction hash can be persisted before the network sees the transaction.
pub trait Submitter: Send + Sync {
    /// Sign a creation transaction for `factory` with fully resolved constructor arguments.
    fn sign_create(
        &self,
        factory: &FactoryHandle,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<SignedTx, SubmitError>> + Send;

    /// Sign a call of `operation` on the component at `target`.
    fn sign_call(
        &self,
        target: Address,
        operation: &str,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<SignedTx, SubmitError>> + Send;

    /// Hand a signed transaction to the network.
    ///
    /// A `Transport` error leaves the outcome unknown: the transaction may have been
    /// accepted anyway.
    fn broadcast(&self, signed: &SignedTx) -> impl Future<Output = Result<(), SubmitError>> + Send;

    /// Query the current status of a submitted transaction.
    fn confirm(&self, tx: &TxRef) -> impl Future<Output = Result<Confirmation, SubmitError>> + Send;

    /// Sign and broadcast a creation.
    fn create(
        &self,
        factory: &FactoryHandle,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<Creation, SubmitError>> + Send {
        async move {
            let signed = self.sign_create(factory, args).await?;
            let address = signed.address.ok_or_else(|| {
                SubmitError::Rejected(format!("creation {} has no predicted address", signed.tx))
            })?;
            self.broadcast(&signed).await?;
            Ok(Creation {
                address,
                tx: signed.tx,
            })
        }
    }

    /// Sign and broadcast a call.
    fn call(
        &self,
        target: Address,
        operation: &str,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<TxRef, SubmitError>> + Send {
        async move {
            let signed = self.sign_call(target, operation, args).await?;
            self.broadcast(&signed).await?;
            Ok(signed.tx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Signs deterministically and remembers what was broadcast.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<TxRef>>,
    }

    impl Submitter for Recorder {
        async fn sign_create(
            &self,
            _factory: &FactoryHandle,
            _args: &[ArgValue],
        ) -> Result<SignedTx, SubmitError> {
            Ok(SignedTx {
                tx: TxRef(B256::repeat_byte(1)),
                raw: Bytes::from_static(&[0x01]),
                address: Some(Address::repeat_byte(0xaa)),
            })
        }

        async fn sign_call(
            &self,
            _target: Address,
            _operation: &str,
            _args: &[ArgValue],
        ) -> Result<SignedTx, SubmitError> {
            Ok(SignedTx {
                tx: TxRef(B256::repeat_byte(2)),
                raw: Bytes::from_static(&[0x02]),
                address: None,
            })
        }

        async fn broadcast(&self, signed: &SignedTx) -> Result<(), SubmitError> {
            self.sent.lock().expect("lock").push(signed.tx);
            Ok(())
        }

        async fn confirm(&self, _tx: &TxRef) -> Result<Confirmation, SubmitError> {
            Ok(Confirmation::Pending)
        }
    }

    #[tokio::test]
    async fn test_create_and_call_sign_then_broadcast() {
        let submitter = Recorder::default();
        let factory = FactoryHandle::new("Velo", Bytes::from_static(&[0x60]));

        let creation = submitter.create(&factory, &[]).await.expect("created");
        assert_eq!(creation.address, Address::repeat_byte(0xaa));
        assert_eq!(creation.tx, TxRef(B256::repeat_byte(1)));

        let tx = submitter
            .call(creation.address, "setMinter", &[])
            .await
            .expect("called");
        assert_eq!(tx, TxRef(B256::repeat_byte(2)));

        assert_eq!(
            *submitter.sent.lock().expect("lock"),
            vec![creation.tx, tx]
        );
    }
}
