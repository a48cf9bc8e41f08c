//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::submitter::SubmitError;

/// Default timeout for RPC requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to send {method} request: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("RPC error on {method}: {message}")]
    Response { method: String, message: String },

    #[error("Malformed {method} response: {reason}")]
    Malformed { method: String, reason: String },
}

impl From<RpcError> for SubmitError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Response { .. } => SubmitError::Rejected(err.to_string()),
            RpcError::Transport { .. } | RpcError::Malformed { .. } => {
                SubmitError::Transport(err.to_string())
            }
        }
    }
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let transport = |source| RpcError::Transport {
        method: method.to_string(),
        source,
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(transport)?;

    let result: Value = response.json().await.map_err(transport)?;

    extract_result(method, result)
}

/// Pull the `result` member out of a JSON-RPC response body.
fn extract_result<T: DeserializeOwned>(method: &str, mut body: Value) -> Result<T, RpcError> {
    if let Some(error) = body.get("error") {
        return Err(RpcError::Response {
            method: method.to_string(),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result_value = body
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::Malformed {
            method: method.to_string(),
            reason: "no result in response".to_string(),
        })?;

    serde_json::from_value(result_value).map_err(|e| RpcError::Malformed {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_result() {
        let value: String =
            extract_result("eth_chainId", json!({"jsonrpc": "2.0", "id": 1, "result": "0xa"}))
                .expect("result present");
        assert_eq!(value, "0xa");

        let null: Option<Value> = extract_result(
            "eth_getTransactionReceipt",
            json!({"jsonrpc": "2.0", "id": 1, "result": null}),
        )
        .expect("null result is valid");
        assert!(null.is_none());
    }

    #[test]
    fn test_extract_error() {
        let err = extract_result::<String>(
            "eth_sendTransaction",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "nonce too low"}}),
        )
        .unwrap_err();

        assert!(matches!(err, RpcError::Response { ref message, .. } if message == "nonce too low"));
        assert!(matches!(SubmitError::from(err), SubmitError::Rejected(_)));
    }

    #[test]
    fn test_extract_missing_result() {
        let err = extract_result::<String>("eth_chainId", json!({"jsonrpc": "2.0", "id": 1}))
            .unwrap_err();
        assert!(matches!(SubmitError::from(err), SubmitError::Transport(_)));
    }
}
