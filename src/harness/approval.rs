use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

use super::executor::{ExecutionResult, TransactionExecutor};
use super::normalizer::normalize;
use crate::blockchain::traits::{Bridge, ChainClient};
use crate::core::errors::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// Native asset, nothing to approve.
    NotRequired,
    AlreadySufficient,
    Approved(ExecutionResult),
    /// Dry run: an approval would have been sent.
    Simulated,
}

impl ApprovalOutcome {
    /// Whether an approval step actually took place (or would have).
    pub fn performed(&self) -> bool {
        matches!(self, ApprovalOutcome::Approved(_) | ApprovalOutcome::Simulated)
    }
}

/// Raises ERC-20 allowances before transfers. Repeated calls for the same
/// spender are free once the allowance is in place.
pub struct ApprovalManager {
    bridge: Arc<dyn Bridge>,
    executor: TransactionExecutor,
}

impl ApprovalManager {
    pub fn new(bridge: Arc<dyn Bridge>, executor: TransactionExecutor) -> Self {
        Self { bridge, executor }
    }

    pub async fn ensure_approval(
        &self,
        client: &dyn ChainClient,
        token: Address,
        spender: Address,
        amount: U256,
        owner: Address,
    ) -> Result<ApprovalOutcome> {
        if token == Address::zero() {
            return Ok(ApprovalOutcome::NotRequired);
        }
        let failed = |reason: String| HarnessError::ApprovalFailed {
            token: format!("{:?}", token),
            spender: format!("{:?}", spender),
            reason,
        };

        let chain_id = client.chain_id();
        let allowance = self
            .bridge
            .erc20_allowance(chain_id, token, owner, spender)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if allowance >= amount {
            debug!(chain_id, ?token, ?spender, %allowance, "Allowance already sufficient");
            return Ok(ApprovalOutcome::AlreadySufficient);
        }

        if self.executor.is_dry_run() {
            info!(chain_id, ?token, ?spender, %amount, "[DRY RUN] Would approve");
            return Ok(ApprovalOutcome::Simulated);
        }

        info!(chain_id, ?token, ?spender, %amount, "Approving spender");
        let raw = self
            .bridge
            .build_approve(chain_id, token, spender, amount, owner)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let tx = normalize(&raw, chain_id).map_err(|e| failed(e.to_string()))?;
        let execution = self.executor.execute(&tx, client).await.map_err(|e| failed(e.to_string()))?;
        Ok(ApprovalOutcome::Approved(execution))
    }
}
