use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::blockchain::types::{
    BridgeAssetParams, CanonicalTx, IndexedTransaction, Route, RouteRequest,
    RouterChain, TokenMapping, TransactionQuery, TxReceiptInfo, UnsignedTransfer,
};
use crate::core::errors::Result;

/// Route-aggregation API: quotes, prepared transactions, claim building and
/// the transfer indexer.
#[async_trait]
pub trait Router: Send + Sync {
    async fn get_all_chains(&self) -> Result<Vec<RouterChain>>;

    /// Wrapped representations of `token_address` across networks.
    async fn get_token_mappings(&self, token_address: Address) -> Result<Vec<TokenMapping>>;

    async fn get_routes(&self, request: &RouteRequest) -> Result<Vec<Route>>;

    async fn get_unsigned_transaction(&self, route: &Route) -> Result<UnsignedTransfer>;

    /// Claim transaction for the deposit `deposit_count` made on
    /// `source_network_id`.
    async fn get_claim_unsigned_transaction(
        &self,
        source_network_id: u32,
        deposit_count: u64,
    ) -> Result<UnsignedTransfer>;

    async fn get_transactions(&self, query: &TransactionQuery) -> Result<Vec<IndexedTransaction>>;
}

/// Direct access to the ERC-20 and bridge contracts of every configured chain.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn erc20_balance(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256>;

    async fn erc20_allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256>;

    async fn build_approve(
        &self,
        chain_id: u64,
        token: Address,
        spender: Address,
        amount: U256,
        from: Address,
    ) -> Result<UnsignedTransfer>;

    async fn build_bridge_asset(
        &self,
        chain_id: u64,
        bridge_address: Address,
        params: &BridgeAssetParams,
        from: Address,
    ) -> Result<UnsignedTransfer>;

    async fn is_claimed(
        &self,
        chain_id: u64,
        bridge_address: Address,
        leaf_index: u64,
        source_bridge_network: u32,
    ) -> Result<bool>;
}

/// JSON-RPC provider plus the signing wallet of one chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Address of the signing wallet.
    fn address(&self) -> Address;

    /// Native balance of `address`.
    async fn get_balance(&self, address: Address) -> Result<U256>;

    async fn estimate_gas(&self, tx: &CanonicalTx) -> Result<U256>;

    /// Signs and broadcasts `tx` with the given gas limit; returns the hash.
    async fn send_transaction(&self, tx: &CanonicalTx, gas_limit: U256) -> Result<String>;

    /// Blocks until `hash` has `confirmations` confirmations.
    async fn wait_for_receipt(&self, hash: &str, confirmations: usize) -> Result<TxReceiptInfo>;

    /// Receipt if the transaction is already included.
    async fn get_receipt(&self, hash: &str) -> Result<Option<TxReceiptInfo>>;
}
