// src/blockchain/bridge/mod.rs

pub mod contracts;

use async_trait::async_trait;
use ethers::{
    providers::{Http, JsonRpcClient, Provider},
    types::{Address, Bytes, U256},
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use self::contracts::{Erc20Token, UnifiedBridge};
use crate::blockchain::traits::Bridge;
use crate::blockchain::types::{BridgeAssetParams, UnsignedTransfer};
use crate::core::config::ChainDescriptor;
use crate::core::errors::{HarnessError, Result};

/// `Bridge` implementation that talks to the contracts directly through one
/// read-only provider per chain. Write operations only build calldata; the
/// chain client signs and sends.
pub struct EthersBridge<P: JsonRpcClient = Http> {
    providers: HashMap<u64, Arc<Provider<P>>>,
}

impl EthersBridge<Http> {
    pub fn from_chains(chains: &[ChainDescriptor]) -> Result<Self> {
        let mut bridge = Self::empty();
        for chain in chains {
            let provider = Provider::<Http>::try_from(chain.rpc_url.as_str()).map_err(|e| {
                HarnessError::Config(format!("Invalid RPC URL for {}: {}", chain.key, e))
            })?;
            bridge.insert(chain, provider);
        }
        Ok(bridge)
    }
}

impl<P: JsonRpcClient + 'static> EthersBridge<P> {
    pub fn empty() -> Self {
        Self { providers: HashMap::new() }
    }

    pub fn insert(&mut self, chain: &ChainDescriptor, provider: Provider<P>) {
        self.providers.insert(chain.chain_id, Arc::new(provider));
    }

    fn provider(&self, chain_id: u64) -> Result<Arc<Provider<P>>> {
        self.providers
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| HarnessError::Config(format!("no provider for chain id {}", chain_id)))
    }
}

fn unsigned(chain_id: u64, to: Address, data: Bytes, value: U256, from: Address) -> Result<UnsignedTransfer> {
    UnsignedTransfer::from_value(json!({
        "from": from,
        "to": to,
        "data": data,
        "value": value.to_string(),
        "chainId": chain_id,
    }))
}

#[async_trait]
impl<P> Bridge for EthersBridge<P>
where
    P: JsonRpcClient + 'static,
{
    async fn erc20_balance(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256> {
        let erc20 = Erc20Token::new(token, self.provider(chain_id)?);
        erc20
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| HarnessError::Rpc(format!("balanceOf failed on {}: {}", chain_id, e)))
    }

    async fn erc20_allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        let erc20 = Erc20Token::new(token, self.provider(chain_id)?);
        let allowance = erc20
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| HarnessError::Rpc(format!("allowance failed on {}: {}", chain_id, e)))?;
        debug!(chain_id, ?token, ?spender, %allowance, "Current allowance");
        Ok(allowance)
    }

    async fn build_approve(
        &self,
        chain_id: u64,
        token: Address,
        spender: Address,
        amount: U256,
        from: Address,
    ) -> Result<UnsignedTransfer> {
        let erc20 = Erc20Token::new(token, self.provider(chain_id)?);
        let data = erc20
            .approve(spender, amount)
            .calldata()
            .ok_or_else(|| HarnessError::MalformedTransaction("approve calldata".to_string()))?;
        unsigned(chain_id, token, data, U256::zero(), from)
    }

    async fn build_bridge_asset(
        &self,
        chain_id: u64,
        bridge_address: Address,
        params: &BridgeAssetParams,
        from: Address,
    ) -> Result<UnsignedTransfer> {
        let bridge = UnifiedBridge::new(bridge_address, self.provider(chain_id)?);
        let data = bridge
            .bridge_asset(
                params.destination_network,
                params.destination_address,
                params.amount,
                params.token,
                params.force_update_global_exit_root,
                Bytes::default(),
            )
            .calldata()
            .ok_or_else(|| HarnessError::MalformedTransaction("bridgeAsset calldata".to_string()))?;
        // Native transfers carry the amount as value.
        let value = if params.token == Address::zero() { params.amount } else { U256::zero() };
        unsigned(chain_id, bridge_address, data, value, from)
    }

    async fn is_claimed(
        &self,
        chain_id: u64,
        bridge_address: Address,
        leaf_index: u64,
        source_bridge_network: u32,
    ) -> Result<bool> {
        let leaf_index = u32::try_from(leaf_index).map_err(|_| {
            HarnessError::Rpc(format!("deposit count {} does not fit a leaf index", leaf_index))
        })?;
        let bridge = UnifiedBridge::new(bridge_address, self.provider(chain_id)?);
        bridge
            .is_claimed(leaf_index, source_bridge_network)
            .call()
            .await
            .map_err(|e| HarnessError::Rpc(format!("isClaimed failed on {}: {}", chain_id, e)))
    }
}
