//! Wire and domain types shared by the router, bridge and chain client seams.

use crate::core::errors::{HarnessError, Result};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Eip1559TransactionRequest,
    NameOrAddress, TransactionRequest, U256, U64,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status the indexer reports for a transfer that is bridged but not claimed.
pub const STATUS_READY_TO_CLAIM: &str = "READY_TO_CLAIM";

/// Transaction object exactly as a backend returned it. Field names and
/// numeric encodings vary between backends; see the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnsignedTransfer(pub Map<String, Value>);

impl UnsignedTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(HarnessError::MalformedTransaction(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Transaction in the shape the signing layer accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTx {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    pub chain_id: u64,
}

impl CanonicalTx {
    /// Back to the raw object form, with every numeric field hex-encoded.
    pub fn to_unsigned(&self) -> UnsignedTransfer {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => UnsignedTransfer(map),
            _ => UnsignedTransfer::new(),
        }
    }

    /// Builds the ethers request. A legacy request is used when the backend
    /// pinned a gas price, otherwise fees are left to the middleware.
    pub fn to_typed_transaction(&self, from: Address, gas_limit: Option<U256>) -> TypedTransaction {
        let gas = gas_limit.or(self.gas_limit);
        match self.gas_price {
            Some(gas_price) => TransactionRequest {
                from: Some(from),
                to: Some(NameOrAddress::Address(self.to)),
                data: Some(self.data.clone()),
                value: Some(self.value),
                gas,
                gas_price: Some(gas_price),
                nonce: self.nonce,
                chain_id: Some(U64::from(self.chain_id)),
                ..Default::default()
            }
            .into(),
            None => Eip1559TransactionRequest {
                from: Some(from),
                to: Some(NameOrAddress::Address(self.to)),
                data: Some(self.data.clone()),
                value: Some(self.value),
                gas,
                nonce: self.nonce,
                chain_id: Some(U64::from(self.chain_id)),
                ..Default::default()
            }
            .into(),
        }
    }
}

/// Receipt summary returned once a transaction is included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceiptInfo {
    pub hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    /// 1 = success, 0 = reverted, `None` for pre-byzantium receipts.
    pub status: Option<u64>,
}

impl TxReceiptInfo {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

/// Chain as listed by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterChain {
    pub chain_id: u64,
    #[serde(default)]
    pub network_id: Option<u32>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMapping {
    pub wrapped_token_network: u32,
    pub wrapped_token_address: Address,
    #[serde(default)]
    pub origin_token_network: Option<u32>,
    #[serde(default)]
    pub origin_token_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub from_token_address: Address,
    pub to_token_address: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    pub from_address: Address,
    /// Percent.
    pub slippage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEstimate {
    #[serde(default)]
    pub approval_address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub estimate: Option<StepEstimate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    #[serde(default)]
    pub transaction_request: Option<UnsignedTransfer>,
}

impl Route {
    /// A route can be turned into a transaction when it carries either a
    /// prepared request or at least one step to build from.
    pub fn is_executable(&self) -> bool {
        self.transaction_request.is_some() || !self.steps.is_empty()
    }

    pub fn approval_address(&self) -> Option<Address> {
        self.steps.iter().find_map(|s| s.estimate.as_ref().and_then(|e| e.approval_address))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub address: Option<Address>,
    pub limit: u32,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    #[serde(default)]
    pub network_id: Option<u32>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

/// Transfer as reported by the router's indexer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTransaction {
    pub transaction_hash: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub deposit_count: Option<u64>,
    #[serde(default)]
    pub sending: Option<TransferLeg>,
    #[serde(default)]
    pub receiving: Option<TransferLeg>,
    #[serde(default)]
    pub protocols: Vec<String>,
}

impl IndexedTransaction {
    pub fn matches_hash(&self, hash: &str) -> bool {
        self.transaction_hash.eq_ignore_ascii_case(hash)
    }

    pub fn uses_protocol(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p.eq_ignore_ascii_case(protocol))
    }
}

/// Arguments of the bridge contract's asset transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeAssetParams {
    pub destination_network: u32,
    pub destination_address: Address,
    pub amount: U256,
    /// Zero for the native asset.
    pub token: Address,
    pub force_update_global_exit_root: bool,
}

/// Serializes `U256` as a decimal string, the format the router expects for
/// amounts.
pub mod decimal_u256 {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(D::Error::custom)
    }
}
