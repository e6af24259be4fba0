//! Drives the scenario list through routing, execution and claiming.
//!
//! Scenarios run strictly one after another: later scenarios depend on
//! wrapped tokens, allowances and nonces left behind by earlier ones, and a
//! single wallet must never have two transactions in flight. Any error inside
//! a scenario ends that scenario only.

use chrono::Utc;
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::approval::ApprovalManager;
use super::checkpoint::{CheckpointLog, CheckpointRecord, CheckpointState};
use super::claims::{ClaimResult, ClaimTracker, TransferRecord};
use super::events::{EventSink, ScenarioState, ScenarioTracker, TracingSink};
use super::executor::{ExecutionResult, TransactionExecutor};
use super::normalizer::normalize;
use super::report::{RunReport, TestResult, TestStatus};
use super::route::{RouteContext, RouteMethod, RouteOutcome, RouteResolver};
use super::ChainClients;
use crate::blockchain::traits::{Bridge, ChainClient, Router};
use crate::core::config::{BridgeScenario, HarnessConfig};
use crate::core::errors::{HarnessError, Result};
use crate::core::token_registry::{TokenDescriptor, TokenRegistry};

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip scenarios recorded as completed in the checkpoint log.
    pub resume: bool,
    /// Only run scenarios whose label contains this (case-insensitive).
    pub only: Option<String>,
    pub skip_existing_claims: bool,
}

enum ScenarioOutcome {
    Skipped(String),
    Completed { method: RouteMethod, execution: ExecutionResult, requires_claim: bool },
}

pub struct ScenarioOrchestrator {
    config: HarnessConfig,
    registry: TokenRegistry,
    router: Arc<dyn Router>,
    bridge: Arc<dyn Bridge>,
    clients: ChainClients,
    resolver: RouteResolver,
    executor: TransactionExecutor,
    claims: ClaimTracker,
    sink: Arc<dyn EventSink>,
    checkpoint: Option<CheckpointLog>,
    wallet: Address,
}

impl ScenarioOrchestrator {
    pub fn new(
        config: HarnessConfig,
        router: Arc<dyn Router>,
        bridge: Arc<dyn Bridge>,
        clients: ChainClients,
        wallet: Address,
    ) -> Self {
        let registry = TokenRegistry::from_config(&config.tokens);
        let executor = TransactionExecutor::new(&config.settings);
        let approvals = Arc::new(ApprovalManager::new(bridge.clone(), executor.clone()));
        let resolver =
            RouteResolver::new(router.clone(), bridge.clone(), approvals, registry.clone(), &config.settings);
        let claims = ClaimTracker::new(
            router.clone(),
            bridge.clone(),
            executor.clone(),
            clients.clone(),
            config.clone(),
            wallet,
        );
        Self {
            config,
            registry,
            router,
            bridge,
            clients,
            resolver,
            executor,
            claims,
            sink: Arc::new(TracingSink),
            checkpoint: None,
            wallet,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointLog) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn claims(&self) -> &ClaimTracker {
        &self.claims
    }

    /// Runs the whole suite and returns the report. Only setup problems with
    /// the checkpoint log are returned as errors.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let settings = &self.config.settings;
        info!(%run_id, dry_run = settings.dry_run, wallet = ?self.wallet, "Starting bridge test run");

        let resumed = self.open_checkpoint(options.resume)?;
        self.record(&CheckpointRecord::RunStarted { run_id });

        if settings.validate_chains {
            self.validate_chains().await;
        }
        self.refresh_all_wrapped().await;

        let mut claim_results = Vec::new();
        if settings.process_existing_claims && !options.skip_existing_claims {
            match self.claims.check_for_existing_claims().await {
                Ok(results) => {
                    for result in &results {
                        self.record(&CheckpointRecord::ClaimAttempted {
                            source_tx_hash: result.claim.source_tx_hash.clone(),
                        });
                    }
                    claim_results.extend(results);
                }
                Err(e) => warn!(error = %e, "Existing-claims scan failed"),
            }
        }
        // The scan may already have handled claims the checkpoint still lists.
        let restored: Vec<_> = resumed
            .pending_claims
            .iter()
            .filter(|pending| {
                !claim_results.iter().any(|done| done.claim.source_tx_hash.eq_ignore_ascii_case(&pending.source_tx_hash))
            })
            .cloned()
            .collect();
        if !restored.is_empty() {
            info!(count = restored.len(), "Restoring pending claims from checkpoint");
            self.claims.seed(restored);
        }

        let only = options.only.as_ref().map(|s| s.to_lowercase());
        let mut results = Vec::new();
        let mut executed = 0usize;
        for (index, scenario) in self.config.scenarios.iter().enumerate() {
            let label = scenario.display_label();
            if let Some(filter) = &only {
                if !label.to_lowercase().contains(filter) {
                    continue;
                }
            }
            if let Some(previous) = resumed.completed.get(&index) {
                info!(scenario = %label, status = ?previous.status, "Already completed, skipping");
                results.push(previous.clone());
                continue;
            }

            if executed > 0 && settings.pacing_delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(settings.pacing_delay_secs)).await;
            }
            executed += 1;

            let result = self.run_scenario(index, scenario).await;
            self.record(&CheckpointRecord::ScenarioCompleted { index, result: result.clone() });
            results.push(result);
        }

        claim_results.extend(self.settle_claims().await);
        Ok(RunReport::new(run_id, started_at, settings.dry_run, results, claim_results))
    }

    /// Waits out the settlement delay and processes every pending claim.
    pub async fn settle_claims(&self) -> Vec<ClaimResult> {
        if !self.claims.has_pending() {
            return Vec::new();
        }
        let delay = self.config.settings.settlement_delay_secs;
        let pending = self.claims.pending().len();
        info!(pending, delay_secs = delay, "Waiting for settlement before claiming");
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        let results = self.claims.process_claims(self.claims.take_pending()).await;
        for result in &results {
            self.record(&CheckpointRecord::ClaimAttempted { source_tx_hash: result.claim.source_tx_hash.clone() });
        }
        results
    }

    /// Runs one scenario to a terminal state.
    pub async fn run_scenario(&self, index: usize, scenario: &BridgeScenario) -> TestResult {
        let label = scenario.display_label();
        let mut tracker = ScenarioTracker::new(index, &label, self.sink.as_ref());
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(scenario = %label, amount = %scenario.amount, "Running scenario");

        let mut result = TestResult {
            label: label.clone(),
            from: scenario.from.clone(),
            to: scenario.to.clone(),
            token: scenario.token.clone(),
            amount: scenario.amount.clone(),
            status: TestStatus::Failed,
            method: None,
            tx_hash: None,
            block_number: None,
            gas_used: None,
            error: None,
            error_kind: None,
            skip_reason: None,
            requires_claim: false,
            started_at,
            duration_ms: 0,
        };

        match self.drive(&mut tracker, scenario).await {
            Ok(ScenarioOutcome::Skipped(reason)) => {
                tracker.advance_with(ScenarioState::Skipped, None, None, Some(&reason));
                result.status = TestStatus::Skipped;
                result.skip_reason = Some(reason);
            }
            Ok(ScenarioOutcome::Completed { method, execution, requires_claim }) => {
                result.status =
                    if execution.simulated { TestStatus::SuccessDryRun } else { TestStatus::Success };
                result.method = Some(method);
                result.tx_hash = Some(execution.hash);
                result.block_number = execution.block_number;
                result.gas_used = execution.gas_used;
                result.requires_claim = requires_claim;
            }
            Err(e) => {
                debug!(scenario = %label, error = ?e, "Scenario error details");
                tracker.advance_with(ScenarioState::Failed, None, None, Some(&e.to_string()));
                result.error_kind = Some(e.kind().to_string());
                result.error = Some(e.to_string());
            }
        }
        result.duration_ms = clock.elapsed().as_millis() as u64;
        result
    }

    async fn drive(&self, tracker: &mut ScenarioTracker<'_>, scenario: &BridgeScenario) -> Result<ScenarioOutcome> {
        let from = self.config.chain(&scenario.from)?;
        let to = self.config.chain(&scenario.to)?;
        let client = self.clients.get(&from.key)?;

        let Some(mut source) = self.registry.descriptor(&scenario.token, &from.key) else {
            return Ok(ScenarioOutcome::Skipped(format!("token not deployed on {}", from.key)));
        };
        if self.registry.descriptor(&scenario.token, &to.key).is_none() {
            return Ok(ScenarioOutcome::Skipped(format!("token not deployed on {}", to.key)));
        }
        if !source.is_resolved() {
            match self.registry.refresh_wrapped(self.router.as_ref(), &self.config.chains, &scenario.token).await {
                Ok(filled) if filled > 0 => {
                    if let Some(refreshed) = self.registry.descriptor(&scenario.token, &from.key) {
                        source = refreshed;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(token = %scenario.token, error = %e, "Wrapped token refresh failed"),
            }
        }

        let amount = parse_amount(&scenario.amount, source.decimals)?;
        if source.is_resolved() {
            let balance = self.source_balance(&source, from.chain_id, client.as_ref()).await?;
            if balance < amount {
                return Ok(ScenarioOutcome::Skipped(format!(
                    "insufficient balance: have {}, need {}",
                    balance, amount
                )));
            }
        }

        tracker.advance(ScenarioState::Routing);
        let ctx = RouteContext { from, to, token: &scenario.token, amount, wallet: self.wallet };
        let (method, route) = match self.resolver.resolve(ctx, client.as_ref()).await? {
            RouteOutcome::Primary(route) => (RouteMethod::Primary, route),
            RouteOutcome::Fallback(route) => (RouteMethod::Fallback, route),
            RouteOutcome::Unavailable { reason } => return Err(HarnessError::NoRouteAvailable(reason)),
        };
        if let Some(reason) = &route.fallback_reason {
            debug!(scenario = %scenario.display_label(), reason = %reason, "Using fallback route");
        }
        if route.approval.performed() {
            tracker.advance(ScenarioState::Approving);
        }

        tracker.advance_with(ScenarioState::Executing, Some(method), None, None);
        let tx = normalize(&route.unsigned, from.chain_id)?;
        let execution = self.executor.execute(&tx, client.as_ref()).await?;

        if route.requires_claim && !execution.simulated {
            tracker.advance_with(ScenarioState::RegisteredForClaim, Some(method), Some(&execution.hash), None);
            let claim = self
                .claims
                .register_pending(&TransferRecord {
                    tx_hash: execution.hash.clone(),
                    source_chain: from.key.clone(),
                    source_network_id: from.network_id,
                    destination_chain: to.key.clone(),
                    destination_network_id: to.network_id,
                    token: scenario.token.clone(),
                    amount: scenario.amount.clone(),
                })
                .await;
            self.record(&CheckpointRecord::ClaimRegistered { claim });
        }

        tracker.advance_with(ScenarioState::Done, Some(method), Some(&execution.hash), None);
        Ok(ScenarioOutcome::Completed { method, execution, requires_claim: route.requires_claim })
    }

    async fn source_balance(
        &self,
        source: &TokenDescriptor,
        chain_id: u64,
        client: &dyn ChainClient,
    ) -> Result<U256> {
        match source.source_address() {
            Some(token) if !source.is_native => self.bridge.erc20_balance(chain_id, token, self.wallet).await,
            _ => client.get_balance(self.wallet).await,
        }
    }

    /// Compares the configured chains with the router's list. Mismatches are
    /// only reported.
    async fn validate_chains(&self) {
        let remote = match self.router.get_all_chains().await {
            Ok(chains) => chains,
            Err(e) => {
                warn!(error = %e, "Could not fetch router chain list");
                return;
            }
        };
        for chain in &self.config.chains {
            match remote.iter().find(|r| r.chain_id == chain.chain_id) {
                None => warn!(chain = %chain.key, chain_id = chain.chain_id, "Chain not supported by the router"),
                Some(r) => match r.network_id {
                    Some(network_id) if network_id != chain.network_id => warn!(
                        chain = %chain.key,
                        configured = chain.network_id,
                        router = network_id,
                        "Network id mismatch"
                    ),
                    _ => debug!(chain = %chain.key, "Chain validated"),
                },
            }
        }
    }

    async fn refresh_all_wrapped(&self) {
        for symbol in self.registry.symbols() {
            if let Err(e) = self.registry.refresh_wrapped(self.router.as_ref(), &self.config.chains, &symbol).await {
                warn!(token = %symbol, error = %e, "Wrapped token refresh failed");
            }
        }
    }

    fn open_checkpoint(&self, resume: bool) -> Result<CheckpointState> {
        let Some(log) = &self.checkpoint else {
            return Ok(CheckpointState::default());
        };
        if resume {
            let state = log.load()?;
            info!(completed = state.completed.len(), path = %log.path().display(), "Resuming from checkpoint");
            Ok(state)
        } else {
            log.reset()?;
            Ok(CheckpointState::default())
        }
    }

    fn record(&self, record: &CheckpointRecord) {
        if let Some(log) = &self.checkpoint {
            if let Err(e) = log.append(record) {
                warn!(path = %log.path().display(), error = %e, "Failed to write checkpoint");
            }
        }
    }
}

/// Converts a human amount ("0.0005") into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    parse_units(amount.trim(), decimals as u32)
        .map(U256::from)
        .map_err(|e| HarnessError::Config(format!("invalid amount '{}': {}", amount, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_use_token_decimals() {
        assert_eq!(parse_amount("0.0005", 18).unwrap(), U256::from(500_000_000_000_000u64));
        assert_eq!(parse_amount("1.0", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_amount("0.00001", 8).unwrap(), U256::from(1_000u64));
        assert!(parse_amount("abc", 18).is_err());
    }
}
