use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    prelude::{JsonRpcClient, Middleware, PendingTransaction},
    providers::{Http, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, TransactionReceipt, H256, U256},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

use super::traits::ChainClient;
use super::types::{CanonicalTx, TxReceiptInfo};
use crate::core::config::ChainDescriptor;
use crate::core::errors::{HarnessError, Result};

/// EVM chain client: a JSON-RPC provider plus the harness wallet.
#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    signer: Arc<SignerMiddleware<Provider<P>, LocalWallet>>,
    network_name: String,
    chain_id: u64,
}

impl EthereumClient<Http> {
    /// Connects to the chain's RPC endpoint and checks that it serves the
    /// configured chain id.
    pub async fn connect(chain: &ChainDescriptor, private_key: &str) -> Result<Self> {
        let rpc_url_clean = chain.rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            HarnessError::Config(format!(
                "Invalid RPC URL '{}' for {}: {}",
                rpc_url_clean, chain.key, e
            ))
        })?;

        info!("Connecting to {} ({})", chain.name, parsed_url);
        // Allow proxy environment vars, like every other outbound client here.
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client = builder
            .build()
            .map_err(|e| HarnessError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(parsed_url.clone(), client));

        let remote_chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| {
                HarnessError::Rpc(format!("Failed to get chain ID from {}: {}", parsed_url, e))
            })?
            .as_u64();
        if remote_chain_id != chain.chain_id {
            return Err(HarnessError::Config(format!(
                "{} RPC reports chain id {} but {} is configured",
                chain.key, remote_chain_id, chain.chain_id
            )));
        }

        let wallet = LocalWallet::from_str(private_key)
            .map_err(|e| HarnessError::Config(format!("Invalid private key: {}", e)))?;

        info!("Connected to {} (Chain ID: {})", chain.name, remote_chain_id);
        Ok(Self::new_with_provider(provider, wallet, remote_chain_id, &chain.key))
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Wraps an existing provider. Used with `MockProvider` in tests.
    pub fn new_with_provider(
        provider: Provider<P>,
        wallet: LocalWallet,
        chain_id: u64,
        network_name: &str,
    ) -> Self {
        let wallet = wallet.with_chain_id(chain_id);
        let signer = Arc::new(SignerMiddleware::new(provider.clone(), wallet));
        Self { provider, signer, network_name: network_name.to_string(), chain_id }
    }

    /// Signing middleware, for contract deployments and calls.
    pub fn signer(&self) -> Arc<SignerMiddleware<Provider<P>, LocalWallet>> {
        self.signer.clone()
    }
}

fn parse_hash(hash: &str) -> Result<H256> {
    H256::from_str(hash)
        .map_err(|e| HarnessError::Rpc(format!("Invalid transaction hash {}: {}", hash, e)))
}

fn receipt_info(receipt: &TransactionReceipt) -> TxReceiptInfo {
    TxReceiptInfo {
        hash: format!("0x{}", hex::encode(receipt.transaction_hash.as_bytes())),
        block_number: receipt.block_number.map(|b| b.as_u64()),
        gas_used: receipt.gas_used,
        status: receipt.status.map(|s| s.as_u64()),
    }
}

#[async_trait]
impl<P> ChainClient for EthereumClient<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        debug!(chain = %self.network_name, "Getting native balance for {:?}", address);
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| HarnessError::Rpc(format!("Failed to get balance: {}", e)))
    }

    async fn estimate_gas(&self, tx: &CanonicalTx) -> Result<U256> {
        let request = tx.to_typed_transaction(self.address(), None);
        let gas = self
            .provider
            .estimate_gas(&request, None)
            .await
            .map_err(|e| HarnessError::Rpc(format!("Gas estimation failed: {}", e)))?;
        debug!(chain = %self.network_name, "Estimated gas = {}", gas);
        Ok(gas)
    }

    async fn send_transaction(&self, tx: &CanonicalTx, gas_limit: U256) -> Result<String> {
        let request = tx.to_typed_transaction(self.address(), Some(gas_limit));
        let pending_tx = self.signer.send_transaction(request, None).await.map_err(|e| {
            HarnessError::Rpc(format!("Failed to send transaction: {}", e))
        })?;

        let tx_hash = format!("0x{}", hex::encode(pending_tx.tx_hash().as_bytes()));
        info!(chain = %self.network_name, tx_hash = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, hash: &str, confirmations: usize) -> Result<TxReceiptInfo> {
        let tx_hash = parse_hash(hash)?;
        let receipt = PendingTransaction::new(tx_hash, &self.provider)
            .confirmations(confirmations)
            .await
            .map_err(|e| HarnessError::Rpc(format!("Failed waiting for {}: {}", hash, e)))?
            .ok_or_else(|| {
                HarnessError::Rpc(format!("Transaction {} was dropped from the mempool", hash))
            })?;
        Ok(receipt_info(&receipt))
    }

    async fn get_receipt(&self, hash: &str) -> Result<Option<TxReceiptInfo>> {
        let tx_hash = parse_hash(hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| HarnessError::Rpc(format!("Failed to get receipt: {}", e)))?;
        Ok(receipt.as_ref().map(receipt_info))
    }
}
