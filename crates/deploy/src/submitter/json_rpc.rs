//! Submitter backed by an Ethereum JSON-RPC node.
//!
//! Transactions are signed with `eth_signTransaction` by an account the node controls and
//! broadcast with `eth_sendRawTransaction`. The nonce is pinned at signing time, so the
//! address of a created contract is known before the transaction is sent.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256, keccak256};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{Confirmation, Receipt, SignedTx, SubmitError, Submitter, TxRef};
use crate::{
    factory::FactoryHandle,
    rpc,
    value::{ArgValue, encode_call, encode_params},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    /// `0x1` on success, `0x0` on revert.
    status: Option<U64>,
    contract_address: Option<Address>,
}

/// `eth_signTransaction` answers with the raw bytes, or with `{raw, tx}` on geth.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignResponse {
    Raw(Bytes),
    Envelope { raw: Bytes },
}

impl SignResponse {
    fn into_raw(self) -> Bytes {
        match self {
            SignResponse::Raw(raw) | SignResponse::Envelope { raw } => raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonRpcSubmitter {
    client: reqwest::Client,
    url: Url,
    from: Address,
}

impl JsonRpcSubmitter {
    pub fn new(url: Url, from: Address, timeout: Duration) -> Result<Self, SubmitError> {
        let client =
            rpc::create_client(timeout).map_err(|e| SubmitError::Transport(e.to_string()))?;
        Ok(Self { client, url, from })
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, SubmitError> {
        Ok(rpc::json_rpc_call(&self.client, self.url.as_str(), method, params).await?)
    }

    async fn pending_nonce(&self) -> Result<u64, SubmitError> {
        let nonce: U64 = self
            .request(
                "eth_getTransactionCount",
                vec![json!(self.from), json!("pending")],
            )
            .await?;
        Ok(nonce.to::<u64>())
    }

    /// Fill gas, gas price and nonce, then have the node sign.
    async fn sign(&self, to: Option<Address>, data: &[u8]) -> Result<SignedTx, SubmitError> {
        let mut tx = json!({
            "from": self.from,
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }

        let gas: U64 = self.request("eth_estimateGas", vec![tx.clone()]).await?;
        let gas_price: U256 = self.request("eth_gasPrice", Vec::new()).await?;
        let nonce = self.pending_nonce().await?;

        tx["gas"] = json!(U64::from(with_headroom(gas.to::<u64>())));
        tx["gasPrice"] = json!(gas_price);
        tx["nonce"] = json!(U64::from(nonce));

        let raw = self
            .request::<SignResponse>("eth_signTransaction", vec![tx])
            .await?
            .into_raw();
        let hash = TxRef(keccak256(&raw));
        let address = to.is_none().then(|| self.from.create(nonce));

        tracing::debug!(
            tx = %hash,
            nonce,
            predicted_address = ?address,
            "Transaction signed"
        );

        Ok(SignedTx {
            tx: hash,
            raw,
            address,
        })
    }
}

/// Estimates are exact for the state they ran against; leave room for drift.
fn with_headroom(gas: u64) -> u64 {
    gas.saturating_add(gas / 5)
}

impl Submitter for JsonRpcSubmitter {
    async fn sign_create(
        &self,
        factory: &FactoryHandle,
        args: &[ArgValue],
    ) -> Result<SignedTx, SubmitError> {
        let mut data = factory.bytecode.to_vec();
        data.extend(encode_params(args));
        self.sign(None, &data).await
    }

    async fn sign_call(
        &self,
        target: Address,
        operation: &str,
        args: &[ArgValue],
    ) -> Result<SignedTx, SubmitError> {
        self.sign(Some(target), &encode_call(operation, args)).await
    }

    async fn broadcast(&self, signed: &SignedTx) -> Result<(), SubmitError> {
        let hash: B256 = self
            .request("eth_sendRawTransaction", vec![json!(signed.raw)])
            .await?;
        if hash != signed.tx.0 {
            tracing::warn!(
                expected = %signed.tx,
                returned = %hash,
                "Node reported a different transaction hash"
            );
        }
        tracing::debug!(tx = %signed.tx, "Transaction broadcast");
        Ok(())
    }

    async fn confirm(&self, tx: &TxRef) -> Result<Confirmation, SubmitError> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", vec![json!(tx.0)])
            .await?;
        if let Some(receipt) = receipt {
            return Ok(receipt_to_confirmation(receipt));
        }

        let transaction: Option<Value> = self
            .request("eth_getTransactionByHash", vec![json!(tx.0)])
            .await?;
        Ok(unmined(transaction))
    }
}

fn receipt_to_confirmation(receipt: RpcReceipt) -> Confirmation {
    let block_number = receipt.block_number.to::<u64>();
    match receipt.status {
        Some(status) if status.is_zero() => Confirmation::Failed {
            reason: format!("transaction reverted in block {block_number}"),
        },
        _ => Confirmation::Confirmed(Receipt {
            tx: TxRef(receipt.transaction_hash),
            block_number,
            contract_address: receipt.contract_address,
        }),
    }
}

/// Status of a transaction without a receipt: queued if the node still knows it.
fn unmined(transaction: Option<Value>) -> Confirmation {
    match transaction {
        Some(_) => Confirmation::Pending,
        None => Confirmation::Failed {
            reason: "dropped: the node does not know the transaction".to_string(),
        },
    }
}
