// tests/util.rs
// Shared fixtures for the scenario pipeline tests

#![allow(dead_code)]

use bridge_e2e::blockchain::mock::{MockBridge, MockChainClient, MockRouter};
use bridge_e2e::blockchain::types::{IndexedTransaction, Route, RouteStep, TransferLeg, UnsignedTransfer};
use bridge_e2e::core::{BridgeScenario, HarnessConfig};
use bridge_e2e::harness::{ChainClients, RecordingSink, ScenarioOrchestrator};
use ethers::types::Address;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub const AGGLAYER_BRIDGE: &str = "0x2a3dd3eb832af982ec71669e178424b10dca2ede";

pub fn wallet() -> Address {
    Address::repeat_byte(0xaa)
}

/// Hash the mock client on `chain_id` returns for its `n`-th send (0-based).
pub fn mock_hash(chain_id: u64, n: usize) -> String {
    format!("0x{:064x}", n + 1 + (chain_id as usize % 1000) * 1000)
}

/// Default chains and tokens with no delays and no startup claim scan.
pub fn config(scenarios: Vec<BridgeScenario>, dry_run: bool) -> HarnessConfig {
    let mut config = HarnessConfig { scenarios, ..HarnessConfig::default() };
    config.settings.dry_run = dry_run;
    config.settings.pacing_delay_secs = 0;
    config.settings.settlement_delay_secs = 0;
    config.settings.process_existing_claims = false;
    config
}

pub fn route(provider: &str, value: &str) -> Route {
    Route {
        provider: provider.to_string(),
        steps: vec![RouteStep::default()],
        transaction_request: Some(
            UnsignedTransfer::from_value(json!({
                "to": AGGLAYER_BRIDGE,
                "data": "0xcd586579",
                "value": value,
                "gas": "150000",
            }))
            .unwrap(),
        ),
        ..Default::default()
    }
}

pub fn ready_to_claim(hash: &str, deposit_count: u64, from_network: u32, to_network: u32) -> IndexedTransaction {
    IndexedTransaction {
        transaction_hash: hash.to_string(),
        status: "READY_TO_CLAIM".to_string(),
        deposit_count: Some(deposit_count),
        sending: Some(TransferLeg { network_id: Some(from_network), ..Default::default() }),
        receiving: Some(TransferLeg { network_id: Some(to_network), ..Default::default() }),
        protocols: vec!["agglayer".to_string()],
    }
}

pub struct Harness {
    pub router: Arc<MockRouter>,
    pub bridge: Arc<MockBridge>,
    pub clients: HashMap<String, Arc<MockChainClient>>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn client(&self, key: &str) -> &MockChainClient {
        &self.clients[key]
    }

    pub fn total_sends(&self) -> usize {
        self.clients.values().map(|c| c.send_count()).sum()
    }
}

/// Wires an orchestrator to mocks, one client per configured chain.
pub fn build(config: &HarnessConfig, router: MockRouter, bridge: MockBridge) -> (ScenarioOrchestrator, Harness) {
    build_with_clients(config, router, bridge, HashMap::new())
}

/// Like [`build`], with some chain clients supplied by the caller.
pub fn build_with_clients(
    config: &HarnessConfig,
    router: MockRouter,
    bridge: MockBridge,
    mut overrides: HashMap<String, MockChainClient>,
) -> (ScenarioOrchestrator, Harness) {
    let router = Arc::new(router);
    let bridge = Arc::new(bridge);
    let sink = Arc::new(RecordingSink::new());

    let mut clients = HashMap::new();
    let mut chain_clients = ChainClients::new();
    for chain in &config.chains {
        let client = Arc::new(
            overrides.remove(&chain.key).unwrap_or_else(|| MockChainClient::new(chain.chain_id, wallet())),
        );
        chain_clients.insert(&chain.key, client.clone());
        clients.insert(chain.key.clone(), client);
    }

    let orchestrator = ScenarioOrchestrator::new(config.clone(), router.clone(), bridge.clone(), chain_clients, wallet())
        .with_sink(sink.clone());
    (orchestrator, Harness { router, bridge, clients, sink })
}
