use ethers::types::U256;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blockchain::traits::ChainClient;
use crate::blockchain::types::CanonicalTx;
use crate::core::config::HarnessSettings;
use crate::core::errors::{HarnessError, Result};

/// Outcome of one submitted (or simulated) transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub simulated: bool,
}

/// Submits normalized transactions and waits for them to be included.
///
/// The executor never retries: submission and wait errors go straight back
/// to the caller.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    dry_run: bool,
    gas_multiplier: f64,
    fallback_gas_limit: U256,
    confirmations: usize,
}

impl TransactionExecutor {
    pub fn new(settings: &HarnessSettings) -> Self {
        Self {
            dry_run: settings.dry_run,
            gas_multiplier: settings.gas_multiplier,
            fallback_gas_limit: U256::from(settings.fallback_gas_limit),
            confirmations: settings.confirmations,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn execute(&self, tx: &CanonicalTx, client: &dyn ChainClient) -> Result<ExecutionResult> {
        if self.dry_run {
            let hash = synthetic_hash();
            info!(chain_id = tx.chain_id, to = ?tx.to, value = %tx.value, tx_hash = %hash, "[DRY RUN] Would send transaction");
            return Ok(ExecutionResult { hash, block_number: None, gas_used: None, simulated: true });
        }

        let gas_limit = apply_multiplier(self.resolve_gas_limit(tx, client).await, self.gas_multiplier);
        debug!(chain_id = tx.chain_id, %gas_limit, "Submitting transaction");

        let hash = client.send_transaction(tx, gas_limit).await?;
        let receipt = client.wait_for_receipt(&hash, self.confirmations).await?;
        if !receipt.succeeded() {
            return Err(HarnessError::TransactionReverted { hash });
        }

        info!(
            chain_id = tx.chain_id,
            tx_hash = %hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(ExecutionResult {
            hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            simulated: false,
        })
    }

    /// Gas limit before the safety multiplier: the transaction's own value,
    /// else an estimate, else the conservative default.
    pub async fn resolve_gas_limit(&self, tx: &CanonicalTx, client: &dyn ChainClient) -> U256 {
        if let Some(gas_limit) = tx.gas_limit {
            return gas_limit;
        }
        match client.estimate_gas(tx).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(chain_id = tx.chain_id, error = %e, fallback = %self.fallback_gas_limit, "Gas estimation failed, using default gas limit");
                self.fallback_gas_limit
            }
        }
    }
}

/// Scales `gas` by `multiplier`, rounding down, in integer arithmetic.
pub fn apply_multiplier(gas: U256, multiplier: f64) -> U256 {
    let per_mille = (multiplier * 1000.0).round().max(0.0) as u64;
    gas.saturating_mul(U256::from(per_mille)) / U256::from(1000u64)
}

/// Random 32-byte hash used for dry-run results.
pub fn synthetic_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}
