//! Repairs the transaction objects returned by the router and the bridge so
//! the signer accepts them.
//!
//! Backends disagree on field names (`gas` vs `gasLimit`) and on numeric
//! encodings (JSON numbers, decimal strings, hex strings, serialized
//! `BigNumber` objects). The rules below are applied in order and each one is
//! a no-op when it does not apply:
//!
//! 1. `gas` is renamed to `gasLimit` unless `gasLimit` is already present.
//! 2. A decimal nonce becomes a hex string; a hex nonce is kept as is.
//! 3. `value`, `gasLimit` and `gasPrice` become minimal lowercase hex;
//!    `value` defaults to `0x0`.
//! 4. `chainId` becomes an integer, defaulting to the expected chain id.
//! 5. Nulls and every field outside the canonical set are dropped.

use ethers::types::{Address, Bytes, U256};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;

use crate::blockchain::types::{CanonicalTx, UnsignedTransfer};
use crate::core::errors::{HarnessError, Result};

/// Field names the signer understands.
pub const CANONICAL_FIELDS: [&str; 7] =
    ["to", "data", "value", "gasLimit", "gasPrice", "nonce", "chainId"];

/// Normalizes `raw` into a transaction for `expected_chain_id`.
pub fn normalize(raw: &UnsignedTransfer, expected_chain_id: u64) -> Result<CanonicalTx> {
    let fields = normalize_fields(raw, expected_chain_id)?;

    let to = match fields.get("to").and_then(Value::as_str) {
        Some(to) => Address::from_str(to)
            .map_err(|e| malformed(format!("invalid `to` address {}: {}", to, e)))?,
        None => return Err(malformed("missing `to`")),
    };
    let data = match fields.get("data").and_then(Value::as_str) {
        Some(data) => parse_bytes(data)?,
        None => return Err(malformed("missing `data`")),
    };

    let chain_id = fields.get("chainId").and_then(Value::as_u64).unwrap_or(expected_chain_id);
    if chain_id != expected_chain_id {
        warn!(chain_id, expected_chain_id, "Transaction targets a different chain than expected");
    }

    Ok(CanonicalTx {
        to,
        data,
        value: optional_quantity(&fields, "value")?.unwrap_or_default(),
        gas_limit: optional_quantity(&fields, "gasLimit")?,
        gas_price: optional_quantity(&fields, "gasPrice")?,
        nonce: optional_quantity(&fields, "nonce")?,
        chain_id,
    })
}

/// Applies the normalization rules at the JSON level and returns the
/// canonical object. `to` and `data` are not validated here.
pub fn normalize_fields(raw: &UnsignedTransfer, expected_chain_id: u64) -> Result<Map<String, Value>> {
    let mut fields: Map<String, Value> =
        raw.0.iter().filter(|(_, v)| !v.is_null()).map(|(k, v)| (k.clone(), v.clone())).collect();

    // Rule 1
    if !fields.contains_key("gasLimit") {
        if let Some(gas) = fields.remove("gas") {
            fields.insert("gasLimit".to_string(), gas);
        }
    }

    // Rule 2
    if let Some(nonce) = fields.get("nonce").cloned() {
        let nonce = match nonce {
            Value::String(s) if is_hex(&s) => Value::String(s),
            other => Value::String(to_hex(parse_quantity(&other, "nonce")?)),
        };
        fields.insert("nonce".to_string(), nonce);
    }

    // Rule 3
    for key in ["value", "gasLimit", "gasPrice"] {
        if let Some(raw_value) = fields.get(key) {
            let hex = to_hex(parse_quantity(raw_value, key)?);
            fields.insert(key.to_string(), Value::String(hex));
        }
    }
    fields.entry("value").or_insert_with(|| Value::String("0x0".to_string()));

    // Rule 4
    let chain_id = match fields.get("chainId") {
        Some(value) => {
            let id = parse_quantity(value, "chainId")?;
            if id > U256::from(u64::MAX) {
                return Err(malformed(format!("chainId {} out of range", id)));
            }
            id.as_u64()
        }
        None => expected_chain_id,
    };
    fields.insert("chainId".to_string(), Value::from(chain_id));

    // Rule 5
    fields.retain(|key, _| CANONICAL_FIELDS.contains(&key.as_str()));
    Ok(fields)
}

/// Reads a numeric quantity in any encoding a backend has been seen to use.
pub fn parse_quantity(value: &Value, field: &str) -> Result<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| malformed(format!("`{}` is not a non-negative integer: {}", field, n))),
        Value::String(s) => parse_numeric_str(s.trim())
            .ok_or_else(|| malformed(format!("`{}` is not numeric: {:?}", field, s))),
        // ethers v5 BigNumber, as serialized (`hex`) or in memory (`_hex`).
        Value::Object(obj) => obj
            .get("hex")
            .or_else(|| obj.get("_hex"))
            .and_then(Value::as_str)
            .and_then(parse_numeric_str)
            .ok_or_else(|| malformed(format!("`{}` is an unsupported object", field))),
        other => Err(malformed(format!("`{}` has unsupported type: {}", field, other))),
    }
}

fn optional_quantity(fields: &Map<String, Value>, key: &str) -> Result<Option<U256>> {
    fields.get(key).map(|v| parse_quantity(v, key)).transpose()
}

fn parse_numeric_str(s: &str) -> Option<U256> {
    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if digits.is_empty() {
            return Some(U256::zero());
        }
        U256::from_str_radix(digits, 16).ok()
    } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        U256::from_dec_str(s).ok()
    } else {
        None
    }
}

fn parse_bytes(data: &str) -> Result<Bytes> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| malformed(format!("invalid `data`: {}", e)))
}

fn is_hex(s: &str) -> bool {
    s.starts_with("0x") || s.starts_with("0X")
}

fn to_hex(value: U256) -> String {
    format!("0x{:x}", value)
}

fn malformed(message: impl Into<String>) -> HarnessError {
    HarnessError::MalformedTransaction(message.into())
}
