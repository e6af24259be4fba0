//! Test token deployment from a compiled artifact.
//!
//! Accepts both artifact layouts in common use: `"bytecode": "0x.."` and
//! `"bytecode": { "object": "0x.." }`. Constructor arguments are matched to
//! the ABI by type: strings take the name then the symbol, `uint8` takes the
//! decimals, any other unsigned integer the initial supply and an address
//! the deployer.

use chrono::{DateTime, Utc};
use ethers::abi::{Abi, ParamType, Token};
use ethers::contract::ContractFactory;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::core::config::ChainDescriptor;
use crate::core::errors::{HarnessError, Result};
use crate::harness::orchestrator::parse_amount;

#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    pub abi: Abi,
    #[serde(deserialize_with = "deserialize_bytecode")]
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

fn deserialize_bytecode<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Bytes, D::Error> {
    let hex_str = match RawBytecode::deserialize(deserializer)? {
        RawBytecode::Hex(s) | RawBytecode::Object { object: s } => s,
    };
    hex::decode(hex_str.trim_start_matches("0x")).map(Bytes::from).map_err(serde::de::Error::custom)
}

pub fn load_artifact(path: &Path) -> Result<ContractArtifact> {
    let content = std::fs::read_to_string(path)?;
    let artifact: ContractArtifact = serde_json::from_str(&content)?;
    if artifact.bytecode.is_empty() {
        return Err(HarnessError::Config(format!("{} has no bytecode", path.display())));
    }
    Ok(artifact)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Human readable initial supply.
    pub supply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub supply: String,
    pub chain: String,
    pub chain_id: u64,
    pub address: Address,
    pub deployer: Address,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-{}.json", self.symbol.to_lowercase(), self.chain));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

pub fn constructor_args(abi: &Abi, params: &TokenParams, deployer: Address) -> Result<Vec<Token>> {
    let Some(constructor) = &abi.constructor else {
        return Ok(Vec::new());
    };
    let supply = parse_amount(&params.supply, params.decimals)?;
    let mut strings = [params.name.clone(), params.symbol.clone()].into_iter();
    constructor
        .inputs
        .iter()
        .map(|input| match &input.kind {
            ParamType::String => strings.next().map(Token::String).ok_or_else(|| {
                HarnessError::Config(format!("unexpected string parameter {}", input.name))
            }),
            ParamType::Uint(8) => Ok(Token::Uint(U256::from(params.decimals))),
            ParamType::Uint(_) => Ok(Token::Uint(supply)),
            ParamType::Address => Ok(Token::Address(deployer)),
            other => Err(HarnessError::Config(format!(
                "unsupported constructor parameter {} of type {}",
                input.name, other
            ))),
        })
        .collect()
}

pub async fn deploy_token<M: Middleware + 'static>(
    client: Arc<M>,
    artifact: &ContractArtifact,
    params: &TokenParams,
    deployer: Address,
    chain: &ChainDescriptor,
) -> Result<DeploymentRecord> {
    let args = constructor_args(&artifact.abi, params, deployer)?;
    info!(chain = %chain.key, symbol = %params.symbol, "Deploying token");

    let factory = ContractFactory::new(artifact.abi.clone(), artifact.bytecode.clone(), client);
    let (contract, receipt) = factory
        .deploy_tokens(args)
        .map_err(|e| HarnessError::Rpc(format!("Failed to prepare deployment: {}", e)))?
        .send_with_receipt()
        .await
        .map_err(|e| HarnessError::Rpc(format!("Deployment failed: {}", e)))?;

    let record = DeploymentRecord {
        name: params.name.clone(),
        symbol: params.symbol.clone(),
        decimals: params.decimals,
        supply: params.supply.clone(),
        chain: chain.key.clone(),
        chain_id: chain.chain_id,
        address: contract.address(),
        deployer,
        tx_hash: format!("0x{}", hex::encode(receipt.transaction_hash.as_bytes())),
        block_number: receipt.block_number.map(|b| b.as_u64()),
        deployed_at: Utc::now(),
    };
    info!(chain = %chain.key, address = ?record.address, tx_hash = %record.tx_hash, "Token deployed");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn abi(inputs: serde_json::Value) -> Abi {
        serde_json::from_value(json!([{ "type": "constructor", "stateMutability": "nonpayable", "inputs": inputs }]))
            .unwrap()
    }

    fn params() -> TokenParams {
        TokenParams {
            name: "Agglayer Test".to_string(),
            symbol: "ASTEST".to_string(),
            decimals: 18,
            supply: "1000000".to_string(),
        }
    }

    #[test]
    fn constructor_arguments_follow_abi_types() {
        let abi = abi(json!([
            { "name": "name_", "type": "string" },
            { "name": "symbol_", "type": "string" },
            { "name": "decimals_", "type": "uint8" },
            { "name": "initialSupply", "type": "uint256" },
            { "name": "owner", "type": "address" }
        ]));
        let deployer = Address::repeat_byte(0x0d);
        let args = constructor_args(&abi, &params(), deployer).unwrap();
        assert_eq!(
            args,
            vec![
                Token::String("Agglayer Test".to_string()),
                Token::String("ASTEST".to_string()),
                Token::Uint(U256::from(18u64)),
                Token::Uint(U256::exp10(24)),
                Token::Address(deployer),
            ]
        );
    }

    #[test]
    fn unsupported_constructor_parameter_is_rejected() {
        let abi = abi(json!([{ "name": "flags", "type": "bytes32" }]));
        let err = constructor_args(&abi, &params(), Address::zero()).unwrap_err();
        assert!(err.to_string().contains("flags"));
    }

    #[test]
    fn artifact_bytecode_in_both_layouts() {
        let dir = tempdir().unwrap();
        let flat = dir.path().join("flat.json");
        std::fs::write(&flat, json!({ "abi": [], "bytecode": "0x6080" }).to_string()).unwrap();
        let nested = dir.path().join("nested.json");
        std::fs::write(&nested, json!({ "abi": [], "bytecode": { "object": "0x6080" } }).to_string()).unwrap();

        assert_eq!(load_artifact(&flat).unwrap().bytecode, Bytes::from(vec![0x60, 0x80]));
        assert_eq!(load_artifact(&nested).unwrap().bytecode, Bytes::from(vec![0x60, 0x80]));
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, json!({ "abi": [], "bytecode": "0x" }).to_string()).unwrap();
        assert_eq!(load_artifact(&path).unwrap_err().kind(), "Config");
    }

    #[test]
    fn record_file_is_named_after_symbol_and_chain() {
        let dir = tempdir().unwrap();
        let record = DeploymentRecord {
            name: "Agglayer Test".to_string(),
            symbol: "ASTEST".to_string(),
            decimals: 18,
            supply: "1000000".to_string(),
            chain: "katana".to_string(),
            chain_id: 747474,
            address: Address::repeat_byte(0x01),
            deployer: Address::repeat_byte(0x02),
            tx_hash: "0xabc".to_string(),
            block_number: Some(10),
            deployed_at: Utc::now(),
        };
        let path = record.write_to(dir.path()).unwrap();
        assert!(path.ends_with("astest-katana.json"));
        let back: DeploymentRecord = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, record);
    }
}
