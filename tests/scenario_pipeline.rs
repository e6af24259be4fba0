// tests/scenario_pipeline.rs
//! Full scenario runs against the in-memory router, bridge and chains.

mod util;

use bridge_e2e::blockchain::mock::{MockBridge, MockChainClient, MockRouter};
use bridge_e2e::blockchain::types::TokenMapping;
use bridge_e2e::core::config::ASTEST_KATANA_PLACEHOLDER;
use bridge_e2e::core::BridgeScenario;
use bridge_e2e::harness::{ClaimOutcome, RouteMethod, RunOptions, ScenarioState, TestStatus};
use ethers::types::{Address, U256};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::str::FromStr;
use util::{build, build_with_clients, config, mock_hash, ready_to_claim, route, wallet};

use ScenarioState::*;

const WBTC_ETHEREUM: &str = "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599";

#[tokio::test]
async fn primary_route_without_claim() {
    let config = config(vec![BridgeScenario::new("base", "katana", "ETH", "0.0005")], false);
    let router = MockRouter::new().with_routes(vec![route("lifi", "500000000000000")]);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Success);
    assert_eq!(result.method, Some(RouteMethod::Primary));
    assert!(!result.requires_claim);
    assert_eq!(result.tx_hash.as_deref(), Some(mock_hash(8453, 0).as_str()));
    assert!(report.claims.is_empty());

    let sent = h.client("base").sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.value, U256::from(500_000_000_000_000u64));
    // 150000 from the route, plus the 1.2x margin
    assert_eq!(sent[0].1, U256::from(180_000u64));
    assert_eq!(h.sink.path(0), vec![Pending, Routing, Executing, Done]);
}

#[tokio::test]
async fn agglayer_transfer_is_claimed_after_settlement() {
    let config = config(vec![BridgeScenario::new("base", "katana", "ETH", "0.0005")], false);
    let router = MockRouter::new()
        .with_routes(vec![route("agglayer", "500000000000000")])
        .with_transactions(vec![ready_to_claim(&mock_hash(8453, 0), 7, 10, 20)]);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.results[0].status, TestStatus::Success);
    assert!(report.results[0].requires_claim);
    assert_eq!(h.sink.path(0), vec![Pending, Routing, Executing, RegisteredForClaim, Done]);

    assert_eq!(report.claims.len(), 1);
    assert_eq!(report.claims[0].claim.deposit_count, Some(7));
    assert!(matches!(report.claims[0].outcome, ClaimOutcome::Claimed { .. }));
    assert_eq!(h.router.claim_requests(), vec![(10, 7)]);
    assert_eq!(h.client("katana").send_count(), 1);
    assert_eq!(report.summary.claims_attempted, 1);
    assert_eq!(report.summary.claims_failed, 0);
}

#[tokio::test]
async fn fallback_when_router_has_no_route() {
    let wbtc = Address::from_str(WBTC_ETHEREUM).unwrap();
    let katana_wbtc = Address::repeat_byte(0x0b);
    let config = config(vec![BridgeScenario::new("katana", "ethereum", "WBTC", "0.00001")], false);
    let router = MockRouter::new().with_routes(vec![]).with_token_mapping(
        wbtc,
        TokenMapping {
            wrapped_token_network: 20,
            wrapped_token_address: katana_wbtc,
            origin_token_network: Some(0),
            origin_token_address: Some(wbtc),
        },
    );
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Success, "{:?}", result.error);
    assert_eq!(result.method, Some(RouteMethod::Fallback));
    assert!(result.requires_claim);
    assert_eq!(h.sink.path(0), vec![Pending, Routing, Approving, Executing, RegisteredForClaim, Done]);

    let requests = h.bridge.bridge_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].destination_network, 0);
    assert_eq!(requests[0].destination_address, wallet());
    assert_eq!(requests[0].token, katana_wbtc);
    assert_eq!(requests[0].amount, U256::from(1_000u64));

    // approve, then bridgeAsset
    assert_eq!(h.client("katana").send_count(), 2);
    assert_eq!(result.tx_hash.as_deref(), Some(mock_hash(747474, 1).as_str()));

    // Nothing indexed: the claim fails on its own, the scenario stays green.
    assert_eq!(report.claims.len(), 1);
    match &report.claims[0].outcome {
        ClaimOutcome::Failed { kind, .. } => assert_eq!(kind, "DepositNotIndexed"),
        other => panic!("unexpected claim outcome {:?}", other),
    }
    assert_eq!(report.summary.success, 1);
}

#[tokio::test]
async fn unresolved_source_fails_before_routing() {
    let config = config(vec![BridgeScenario::new("base", "katana", "ASTEST", "10")], false);
    let (orchestrator, h) = build(&config, MockRouter::new(), MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("TokenNotResolved"));
    assert!(h.router.route_requests().is_empty());
    assert!(h.bridge.bridge_requests().is_empty());
    assert_eq!(h.total_sends(), 0);
    assert_eq!(h.sink.path(0), vec![Pending, Routing, Failed]);
}

#[tokio::test]
async fn default_astest_bridges_out_of_katana_but_not_into_it() {
    let config = config(
        vec![
            BridgeScenario::new("base", "katana", "ASTEST", "10"),
            BridgeScenario::new("katana", "base", "ASTEST", "10"),
        ],
        false,
    );
    let astest = Address::from_str(ASTEST_KATANA_PLACEHOLDER).unwrap();
    let router = MockRouter::new().with_routes(vec![route("lifi", "0")]);
    let bridge = MockBridge::new().with_balance(747474, astest, U256::exp10(20));
    let (orchestrator, h) = build(&config, router, bridge);

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.results[0].error_kind.as_deref(), Some("TokenNotResolved"));
    assert_eq!(report.results[1].status, TestStatus::Success);
    assert_eq!(report.results[1].method, Some(RouteMethod::Primary));
    let requests = h.router.route_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].from_token_address, astest);
    assert_eq!(requests[0].to_token_address, Address::zero());
    assert_eq!(h.sink.path(1), vec![Pending, Routing, Approving, Executing, Done]);
    // approval, then the transfer
    assert_eq!(h.client("katana").send_count(), 2);
    assert_eq!(h.client("base").send_count(), 0);
}

#[tokio::test]
async fn dry_run_sends_nothing() {
    let config = config(
        vec![
            BridgeScenario::new("base", "katana", "ETH", "0.0005"),
            BridgeScenario::new("base", "katana", "USDC", "1.0"),
        ],
        true,
    );
    let router = MockRouter::new()
        .with_routes(vec![route("agglayer", "0")])
        .with_transactions(vec![ready_to_claim(&mock_hash(8453, 0), 7, 10, 20)]);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert!(report.dry_run);
    for result in &report.results {
        assert_eq!(result.status, TestStatus::SuccessDryRun);
        let hash = result.tx_hash.as_deref().unwrap();
        assert!(hash.starts_with("0x") && hash.len() == 66);
    }
    assert_eq!(h.sink.path(1), vec![Pending, Routing, Approving, Executing, Done]);
    assert_eq!(h.total_sends(), 0);
    assert!(report.claims.is_empty());
    assert!(!orchestrator.claims().has_pending());
}

#[tokio::test]
async fn missing_token_and_low_balance_are_skipped() {
    let config = config(
        vec![
            BridgeScenario::new("base", "polygon-zkevm", "USDC", "1.0"),
            BridgeScenario::new("base", "katana", "ETH", "0.0005"),
        ],
        false,
    );
    let overrides = HashMap::from([(
        "base".to_string(),
        MockChainClient::new(8453, wallet()).with_balance(U256::from(1u64)),
    )]);
    let router = MockRouter::new().with_routes(vec![route("lifi", "0")]);
    let (orchestrator, h) = build_with_clients(&config, router, MockBridge::new(), overrides);

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.results[0].status, TestStatus::Skipped);
    assert_eq!(report.results[0].skip_reason.as_deref(), Some("token not deployed on polygon-zkevm"));
    assert_eq!(report.results[1].status, TestStatus::Skipped);
    assert!(report.results[1].skip_reason.as_deref().unwrap().starts_with("insufficient balance"));

    assert_eq!(h.sink.path(0), vec![Pending, Skipped]);
    assert_eq!(h.sink.path(1), vec![Pending, Skipped]);
    assert!(h.router.route_requests().is_empty());
    assert_eq!(report.summary.skipped, 2);
}

#[tokio::test]
async fn no_route_on_either_path_fails() {
    let config = config(vec![BridgeScenario::new("base", "katana", "ETH", "0.0005")], false);
    let router = MockRouter::new().with_route_error("502 Bad Gateway");
    let bridge = MockBridge::new().with_bridge_asset_error("bridge RPC unavailable");
    let (orchestrator, h) = build(&config, router, bridge);

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("NoRouteAvailable"));
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("502 Bad Gateway") && error.contains("bridge RPC unavailable"), "{}", error);
    assert_eq!(h.total_sends(), 0);
    assert_eq!(h.sink.path(0), vec![Pending, Routing, Failed]);
}

#[tokio::test]
async fn approval_failure_does_not_fall_back() {
    let config = config(vec![BridgeScenario::new("base", "katana", "USDC", "1.0")], false);
    let router = MockRouter::new().with_routes(vec![route("agglayer", "0")]);
    let bridge = MockBridge::new().with_approve_error("nonce too low");
    let (orchestrator, h) = build(&config, router, bridge);

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.error_kind.as_deref(), Some("ApprovalFailed"));
    assert!(h.bridge.bridge_requests().is_empty());
    assert_eq!(h.total_sends(), 0);
}

#[tokio::test]
async fn claim_failures_are_isolated() {
    let config = config(
        vec![
            BridgeScenario::new("base", "katana", "ETH", "0.0005"),
            BridgeScenario::new("base", "katana", "ETH", "0.0006"),
        ],
        false,
    );
    let router = MockRouter::new().with_routes(vec![route("agglayer", "0")]).with_transactions(vec![
        ready_to_claim(&mock_hash(8453, 0), 7, 10, 20),
        ready_to_claim(&mock_hash(8453, 1), 8, 10, 20),
    ]);
    router.fail_claim_for(7);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert!(report.results.iter().all(|r| r.status == TestStatus::Success));
    assert_eq!(report.claims.len(), 2);
    assert!(matches!(&report.claims[0].outcome, ClaimOutcome::Failed { kind, .. } if kind == "Router"));
    assert!(matches!(report.claims[1].outcome, ClaimOutcome::Claimed { .. }));
    assert_eq!(h.router.claim_requests(), vec![(10, 7), (10, 8)]);
    assert_eq!(h.client("katana").send_count(), 1);
    assert_eq!(report.summary.claims_attempted, 2);
    assert_eq!(report.summary.claims_failed, 1);
}

#[tokio::test]
async fn already_claimed_deposit_is_not_resubmitted() {
    let config = config(vec![BridgeScenario::new("base", "katana", "ETH", "0.0005")], false);
    let router = MockRouter::new()
        .with_routes(vec![route("agglayer", "0")])
        .with_transactions(vec![ready_to_claim(&mock_hash(8453, 0), 7, 10, 20)]);
    let bridge = MockBridge::new();
    bridge.mark_claimed(10, 7);
    let (orchestrator, h) = build(&config, router, bridge);

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.claims[0].outcome, ClaimOutcome::AlreadyClaimed);
    assert!(h.router.claim_requests().is_empty());
    assert_eq!(h.client("katana").send_count(), 0);
}

#[tokio::test]
async fn only_filter_selects_scenarios() {
    let config = config(
        vec![
            BridgeScenario::new("base", "katana", "ETH", "0.0005"),
            BridgeScenario::new("katana", "base", "ETH", "0.0005"),
        ],
        false,
    );
    let router = MockRouter::new().with_routes(vec![route("lifi", "0")]);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let options = RunOptions { only: Some("KATANA -> BASE".to_string()), ..Default::default() };
    let report = orchestrator.run(&options).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].from, "katana");
    assert_eq!(h.client("base").send_count(), 0);
    assert_eq!(h.client("katana").send_count(), 1);
}

#[tokio::test]
async fn existing_claims_are_processed_before_scenarios() {
    let mut config = config(vec![], false);
    config.settings.process_existing_claims = true;
    let router = MockRouter::new().with_transactions(vec![
        ready_to_claim("0xfeed", 3, 0, 20),
        // unknown network, ignored
        ready_to_claim("0xbeef", 4, 99, 20),
    ]);
    let (orchestrator, h) = build(&config, router, MockBridge::new());

    let report = orchestrator.run(&RunOptions::default()).await.unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.claims.len(), 1);
    assert_eq!(report.claims[0].claim.source_chain, "ethereum");
    assert_eq!(h.router.claim_requests(), vec![(0, 3)]);

    let skipped = orchestrator
        .run(&RunOptions { skip_existing_claims: true, ..Default::default() })
        .await
        .unwrap();
    assert!(skipped.claims.is_empty());
}
