//! Resolved argument values and their ABI encoding.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256, keccak256},
};
use serde::{Deserialize, Serialize};

/// A concrete constructor or call argument.
///
/// Values are produced by resolving an [`ArgRef`](crate::plan::ArgRef) against the ledger
/// and the active network configuration, so they never contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bytes32(B256),
    AddressArray(Vec<Address>),
    UintArray(Vec<U256>),
}

impl ArgValue {
    /// The Solidity type name used to build function signatures.
    pub fn sol_type(&self) -> &'static str {
        match self {
            ArgValue::Address(_) => "address",
            ArgValue::Uint(_) => "uint256",
            ArgValue::Bytes32(_) => "bytes32",
            ArgValue::AddressArray(_) => "address[]",
            ArgValue::UintArray(_) => "uint256[]",
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            ArgValue::Address(address) => Some(*address),
            _ => None,
        }
    }

    fn to_sol_value(&self) -> DynSolValue {
        match self {
            ArgValue::Address(address) => DynSolValue::Address(*address),
            ArgValue::Uint(value) => DynSolValue::Uint(*value, 256),
            ArgValue::Bytes32(word) => DynSolValue::FixedBytes(*word, 32),
            ArgValue::AddressArray(addresses) => DynSolValue::Array(
                addresses.iter().copied().map(DynSolValue::Address).collect(),
            ),
            ArgValue::UintArray(values) => DynSolValue::Array(
                values.iter().map(|v| DynSolValue::Uint(*v, 256)).collect(),
            ),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, "]")
        }

        match self {
            ArgValue::Address(address) => write!(f, "{address}"),
            ArgValue::Uint(value) => write!(f, "{value}"),
            ArgValue::Bytes32(word) => write!(f, "{word}"),
            ArgValue::AddressArray(addresses) => list(f, addresses),
            ArgValue::UintArray(values) => list(f, values),
        }
    }
}

/// ABI-encode a list of arguments as function or constructor parameters.
pub fn encode_params(args: &[ArgValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.iter().map(ArgValue::to_sol_value).collect()).abi_encode_params()
}

/// Build the canonical function signature, e.g. `initialize(address[],address)`.
pub fn function_signature(operation: &str, args: &[ArgValue]) -> String {
    let types: Vec<&str> = args.iter().map(ArgValue::sol_type).collect();
    format!("{}({})", operation, types.join(","))
}

/// ABI-encode a call: 4-byte selector followed by the encoded parameters.
pub fn encode_call(operation: &str, args: &[ArgValue]) -> Vec<u8> {
    let signature = function_signature(operation, args);
    let selector = keccak256(signature.as_bytes());

    let mut calldata = selector[..4].to_vec();
    calldata.extend(encode_params(args));
    calldata
}

/// Encode a short UTF-8 string as a null-terminated bytes32 value.
///
/// At most 31 bytes fit, the last byte is always zero.
pub fn format_bytes32_string(text: &str) -> Result<B256, String> {
    let bytes = text.as_bytes();
    if bytes.len() > 31 {
        return Err(format!(
            "bytes32 string must be at most 31 bytes, got {}",
            bytes.len()
        ));
    }
    Ok(B256::right_padding_from(bytes))
}
