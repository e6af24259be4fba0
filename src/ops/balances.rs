//! Native and token balances of one address across every configured chain.

use ethers::types::{Address, U256};
use ethers::utils::format_units;
use serde::Serialize;
use tracing::{info, warn};

use crate::blockchain::traits::Bridge;
use crate::core::config::HarnessConfig;
use crate::core::token_registry::TokenRegistry;
use crate::harness::ChainClients;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    pub chain: String,
    pub symbol: String,
    pub token: Option<Address>,
    pub raw: Option<U256>,
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads every (token, chain) balance of `owner`. Unresolved tokens and
/// failed reads are reported per line; nothing aborts the sweep.
pub async fn collect_balances(
    config: &HarnessConfig,
    registry: &TokenRegistry,
    bridge: &dyn Bridge,
    clients: &ChainClients,
    owner: Address,
) -> Vec<BalanceLine> {
    let mut lines = Vec::new();
    for chain in &config.chains {
        let client = match clients.get(&chain.key) {
            Ok(client) => client,
            Err(e) => {
                warn!(chain = %chain.key, error = %e, "Skipping chain");
                continue;
            }
        };
        for symbol in registry.symbols() {
            let Some(descriptor) = registry.descriptor(&symbol, &chain.key) else {
                continue;
            };
            let read = match descriptor.source_address() {
                None => Err("not resolved".to_string()),
                Some(_) if descriptor.is_native => client.get_balance(owner).await.map_err(|e| e.to_string()),
                Some(token) => bridge.erc20_balance(chain.chain_id, token, owner).await.map_err(|e| e.to_string()),
            };
            let line = match read {
                Ok(raw) => BalanceLine {
                    chain: chain.key.clone(),
                    symbol: descriptor.symbol.clone(),
                    token: descriptor.address,
                    raw: Some(raw),
                    formatted: format_units(raw, descriptor.decimals as u32).unwrap_or_else(|_| raw.to_string()),
                    error: None,
                },
                Err(error) => BalanceLine {
                    chain: chain.key.clone(),
                    symbol: descriptor.symbol.clone(),
                    token: descriptor.address,
                    raw: None,
                    formatted: "-".to_string(),
                    error: Some(error),
                },
            };
            lines.push(line);
        }
    }
    lines
}

pub fn log_balances(owner: Address, lines: &[BalanceLine]) {
    info!(owner = ?owner, "Balances");
    for line in lines {
        match &line.error {
            None => info!(chain = %line.chain, token = %line.symbol, "{}", line.formatted),
            Some(error) => warn!(chain = %line.chain, token = %line.symbol, "{}", error),
        }
    }
}
