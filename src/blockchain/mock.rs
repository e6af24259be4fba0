//! In-memory implementations of the collaborator traits.
//!
//! Every mock records the calls it receives so tests can assert on what the
//! pipeline did (or did not) send.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::blockchain::traits::{Bridge, ChainClient, Router};
use crate::blockchain::types::{
    BridgeAssetParams, CanonicalTx, IndexedTransaction, Route, RouteRequest,
    RouterChain, TokenMapping, TransactionQuery, TxReceiptInfo, UnsignedTransfer,
};
use crate::core::errors::{HarnessError, Result};

/// Target used by the mock claim transactions.
pub const MOCK_CLAIM_TARGET: &str = "0x2a3dd3eb832af982ec71669e178424b10dca2ede";

#[derive(Default)]
pub struct MockRouter {
    chains: Mutex<Vec<RouterChain>>,
    token_mappings: Mutex<HashMap<Address, Vec<TokenMapping>>>,
    routes: Mutex<Option<Vec<Route>>>,
    route_error: Mutex<Option<String>>,
    unsigned_tx: Mutex<Option<UnsignedTransfer>>,
    failing_claims: Mutex<HashSet<u64>>,
    transactions: Mutex<Vec<IndexedTransaction>>,
    queued_transactions: Mutex<VecDeque<Vec<IndexedTransaction>>>,
    calls: Mutex<Vec<String>>,
    route_requests: Mutex<Vec<RouteRequest>>,
    claim_requests: Mutex<Vec<(u32, u64)>>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chains(self, chains: Vec<RouterChain>) -> Self {
        *self.chains.lock() = chains;
        self
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        *self.routes.lock() = Some(routes);
        self
    }

    pub fn with_route_error(self, message: &str) -> Self {
        *self.route_error.lock() = Some(message.to_string());
        self
    }

    pub fn with_unsigned_tx(self, tx: UnsignedTransfer) -> Self {
        *self.unsigned_tx.lock() = Some(tx);
        self
    }

    pub fn with_token_mapping(self, origin: Address, mapping: TokenMapping) -> Self {
        self.token_mappings.lock().entry(origin).or_default().push(mapping);
        self
    }

    pub fn with_transactions(self, transactions: Vec<IndexedTransaction>) -> Self {
        *self.transactions.lock() = transactions;
        self
    }

    /// Responses returned (in order) before falling back to the standing list.
    pub fn queue_transactions(&self, transactions: Vec<IndexedTransaction>) {
        self.queued_transactions.lock().push_back(transactions);
    }

    pub fn set_transactions(&self, transactions: Vec<IndexedTransaction>) {
        *self.transactions.lock() = transactions;
    }

    pub fn fail_claim_for(&self, deposit_count: u64) {
        self.failing_claims.lock().insert(deposit_count);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn route_requests(&self) -> Vec<RouteRequest> {
        self.route_requests.lock().clone()
    }

    pub fn claim_requests(&self) -> Vec<(u32, u64)> {
        self.claim_requests.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl Router for MockRouter {
    async fn get_all_chains(&self) -> Result<Vec<RouterChain>> {
        self.record("get_all_chains");
        Ok(self.chains.lock().clone())
    }

    async fn get_token_mappings(&self, token_address: Address) -> Result<Vec<TokenMapping>> {
        self.record("get_token_mappings");
        Ok(self.token_mappings.lock().get(&token_address).cloned().unwrap_or_default())
    }

    async fn get_routes(&self, request: &RouteRequest) -> Result<Vec<Route>> {
        self.record("get_routes");
        self.route_requests.lock().push(request.clone());
        if let Some(message) = self.route_error.lock().clone() {
            return Err(HarnessError::Router(message));
        }
        Ok(self.routes.lock().clone().unwrap_or_default())
    }

    async fn get_unsigned_transaction(&self, _route: &Route) -> Result<UnsignedTransfer> {
        self.record("get_unsigned_transaction");
        self.unsigned_tx
            .lock()
            .clone()
            .ok_or_else(|| HarnessError::Router("no unsigned transaction configured".to_string()))
    }

    async fn get_claim_unsigned_transaction(
        &self,
        source_network_id: u32,
        deposit_count: u64,
    ) -> Result<UnsignedTransfer> {
        self.record("get_claim_unsigned_transaction");
        self.claim_requests.lock().push((source_network_id, deposit_count));
        if self.failing_claims.lock().contains(&deposit_count) {
            return Err(HarnessError::Router(format!("claim proof unavailable for {}", deposit_count)));
        }
        UnsignedTransfer::from_value(json!({
            "to": MOCK_CLAIM_TARGET,
            "data": "0xccaa11bb",
            "gas": "46247",
            "value": 0,
        }))
    }

    async fn get_transactions(&self, query: &TransactionQuery) -> Result<Vec<IndexedTransaction>> {
        self.record("get_transactions");
        let batch = self.queued_transactions.lock().pop_front();
        let mut transactions = batch.unwrap_or_else(|| self.transactions.lock().clone());
        transactions.truncate(query.limit as usize);
        Ok(transactions)
    }
}

#[derive(Default)]
pub struct MockBridge {
    allowances: Mutex<HashMap<(u64, Address), U256>>,
    balances: Mutex<HashMap<(u64, Address), U256>>,
    claimed: Mutex<HashSet<(u32, u64)>>,
    fail_bridge_asset: Mutex<Option<String>>,
    fail_approve: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    bridge_requests: Mutex<Vec<BridgeAssetParams>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowance(self, chain_id: u64, token: Address, allowance: U256) -> Self {
        self.allowances.lock().insert((chain_id, token), allowance);
        self
    }

    pub fn with_balance(self, chain_id: u64, token: Address, balance: U256) -> Self {
        self.balances.lock().insert((chain_id, token), balance);
        self
    }

    pub fn with_bridge_asset_error(self, message: &str) -> Self {
        *self.fail_bridge_asset.lock() = Some(message.to_string());
        self
    }

    pub fn with_approve_error(self, message: &str) -> Self {
        *self.fail_approve.lock() = Some(message.to_string());
        self
    }

    pub fn mark_claimed(&self, source_network: u32, leaf_index: u64) {
        self.claimed.lock().insert((source_network, leaf_index));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn bridge_requests(&self) -> Vec<BridgeAssetParams> {
        self.bridge_requests.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn erc20_balance(&self, chain_id: u64, token: Address, _owner: Address) -> Result<U256> {
        self.record("erc20_balance");
        Ok(self.balances.lock().get(&(chain_id, token)).copied().unwrap_or_else(U256::max_value))
    }

    async fn erc20_allowance(
        &self,
        chain_id: u64,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256> {
        self.record("erc20_allowance");
        Ok(self.allowances.lock().get(&(chain_id, token)).copied().unwrap_or_default())
    }

    async fn build_approve(
        &self,
        chain_id: u64,
        token: Address,
        _spender: Address,
        amount: U256,
        from: Address,
    ) -> Result<UnsignedTransfer> {
        self.record("build_approve");
        if let Some(message) = self.fail_approve.lock().clone() {
            return Err(HarnessError::Rpc(message));
        }
        // Allowance takes effect immediately in the mock.
        self.allowances.lock().insert((chain_id, token), amount);
        UnsignedTransfer::from_value(json!({
            "from": from,
            "to": token,
            "data": "0x095ea7b3",
            "gas": "60000",
        }))
    }

    async fn build_bridge_asset(
        &self,
        chain_id: u64,
        bridge_address: Address,
        params: &BridgeAssetParams,
        _from: Address,
    ) -> Result<UnsignedTransfer> {
        self.record("build_bridge_asset");
        self.bridge_requests.lock().push(params.clone());
        if let Some(message) = self.fail_bridge_asset.lock().clone() {
            return Err(HarnessError::Rpc(message));
        }
        let value = if params.token == Address::zero() { params.amount } else { U256::zero() };
        UnsignedTransfer::from_value(json!({
            "to": bridge_address,
            "data": "0xcd586579",
            "value": value.to_string(),
            "chainId": chain_id,
        }))
    }

    async fn is_claimed(
        &self,
        _chain_id: u64,
        _bridge_address: Address,
        leaf_index: u64,
        source_bridge_network: u32,
    ) -> Result<bool> {
        self.record("is_claimed");
        Ok(self.claimed.lock().contains(&(source_bridge_network, leaf_index)))
    }
}

pub struct MockChainClient {
    chain_id: u64,
    address: Address,
    balance: Mutex<U256>,
    gas_estimate: Mutex<Option<U256>>,
    send_error: Mutex<Option<String>>,
    revert: Mutex<bool>,
    sent: Mutex<Vec<(CanonicalTx, U256)>>,
    waits: Mutex<Vec<String>>,
}

impl MockChainClient {
    pub fn new(chain_id: u64, address: Address) -> Self {
        Self {
            chain_id,
            address,
            balance: Mutex::new(U256::exp10(24)),
            gas_estimate: Mutex::new(Some(U256::from(100_000u64))),
            send_error: Mutex::new(None),
            revert: Mutex::new(false),
            sent: Mutex::new(Vec::new()),
            waits: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(self, balance: U256) -> Self {
        *self.balance.lock() = balance;
        self
    }

    /// `None` makes gas estimation fail.
    pub fn with_gas_estimate(self, estimate: Option<U256>) -> Self {
        *self.gas_estimate.lock() = estimate;
        self
    }

    pub fn with_send_error(self, message: &str) -> Self {
        *self.send_error.lock() = Some(message.to_string());
        self
    }

    pub fn reverting(self) -> Self {
        *self.revert.lock() = true;
        self
    }

    /// Every submitted transaction with the gas limit it was sent with.
    pub fn sent(&self) -> Vec<(CanonicalTx, U256)> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn hash_for(index: usize) -> String {
        format!("0x{:064x}", index + 1)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn get_balance(&self, _address: Address) -> Result<U256> {
        Ok(*self.balance.lock())
    }

    async fn estimate_gas(&self, _tx: &CanonicalTx) -> Result<U256> {
        (*self.gas_estimate.lock())
            .ok_or_else(|| HarnessError::Rpc("execution reverted during estimation".to_string()))
    }

    async fn send_transaction(&self, tx: &CanonicalTx, gas_limit: U256) -> Result<String> {
        if let Some(message) = self.send_error.lock().clone() {
            return Err(HarnessError::Rpc(message));
        }
        let mut sent = self.sent.lock();
        sent.push((tx.clone(), gas_limit));
        Ok(Self::hash_for(sent.len() - 1 + (self.chain_id as usize % 1000) * 1000))
    }

    async fn wait_for_receipt(&self, hash: &str, _confirmations: usize) -> Result<TxReceiptInfo> {
        self.waits.lock().push(hash.to_string());
        let status = if *self.revert.lock() { 0 } else { 1 };
        Ok(TxReceiptInfo {
            hash: hash.to_string(),
            block_number: Some(1_000 + self.waits.lock().len() as u64),
            gas_used: Some(U256::from(21_000u64)),
            status: Some(status),
        })
    }

    async fn get_receipt(&self, hash: &str) -> Result<Option<TxReceiptInfo>> {
        let known = self.waits.lock().iter().any(|h| h.eq_ignore_ascii_case(hash));
        Ok(known.then(|| TxReceiptInfo {
            hash: hash.to_string(),
            block_number: Some(1_000),
            gas_used: Some(U256::from(21_000u64)),
            status: Some(1),
        }))
    }
}
