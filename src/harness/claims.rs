//! Deferred destination-chain claims.
//!
//! Transfers that settle through the bridge need a second transaction on the
//! destination chain once the source deposit is provable. The tracker keeps
//! those transfers, resolves their deposit counts from the router's indexer
//! and submits the claims. Every claim is handled on its own: one failure is
//! recorded and the next claim still runs.

use ethers::types::{Address, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::executor::TransactionExecutor;
use super::normalizer::normalize;
use super::ChainClients;
use crate::blockchain::traits::{Bridge, Router};
use crate::blockchain::types::{IndexedTransaction, TransactionQuery, STATUS_READY_TO_CLAIM};
use crate::core::config::HarnessConfig;
use crate::core::errors::{HarnessError, Result};

/// Indexer window used right after a transfer confirms.
pub const REGISTRATION_LOOKUP_LIMIT: u32 = 20;
/// Wider window used when claiming and when scanning for leftovers.
pub const CLAIM_LOOKUP_LIMIT: u32 = 100;

/// A confirmed live transfer that needs a claim.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub tx_hash: String,
    pub source_chain: String,
    pub source_network_id: u32,
    pub destination_chain: String,
    pub destination_network_id: u32,
    pub token: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClaim {
    pub source_tx_hash: String,
    pub source_chain: String,
    pub source_network_id: u32,
    pub destination_chain: String,
    pub destination_network_id: u32,
    pub token: String,
    pub amount: String,
    /// `None` until the indexer has seen the source transaction.
    pub deposit_count: Option<u64>,
}

impl PendingClaim {
    pub fn label(&self) -> String {
        format!("{} {} → {} ({})", self.token, self.source_chain, self.destination_chain, self.source_tx_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimOutcome {
    Claimed { hash: String, block_number: Option<u64>, gas_used: Option<U256> },
    Simulated { hash: String },
    AlreadyClaimed,
    Failed { kind: String, error: String },
}

impl ClaimOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ClaimOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim: PendingClaim,
    pub outcome: ClaimOutcome,
}

pub struct ClaimTracker {
    router: Arc<dyn Router>,
    bridge: Arc<dyn Bridge>,
    executor: TransactionExecutor,
    clients: ChainClients,
    config: HarnessConfig,
    wallet: Address,
    pending: Mutex<Vec<PendingClaim>>,
}

impl ClaimTracker {
    pub fn new(
        router: Arc<dyn Router>,
        bridge: Arc<dyn Bridge>,
        executor: TransactionExecutor,
        clients: ChainClients,
        config: HarnessConfig,
        wallet: Address,
    ) -> Self {
        Self {
            router,
            bridge,
            executor,
            clients,
            config,
            wallet,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Records `transfer` for claiming and tries to resolve its deposit count
    /// right away. Indexer errors only defer the lookup.
    pub async fn register_pending(&self, transfer: &TransferRecord) -> PendingClaim {
        let deposit_count = match self.lookup_deposit(&transfer.tx_hash, REGISTRATION_LOOKUP_LIMIT).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tx_hash = %transfer.tx_hash, error = %e, "Deposit lookup failed, deferring to claim time");
                None
            }
        };
        let claim = PendingClaim {
            source_tx_hash: transfer.tx_hash.clone(),
            source_chain: transfer.source_chain.clone(),
            source_network_id: transfer.source_network_id,
            destination_chain: transfer.destination_chain.clone(),
            destination_network_id: transfer.destination_network_id,
            token: transfer.token.clone(),
            amount: transfer.amount.clone(),
            deposit_count,
        };
        info!(claim = %claim.label(), deposit_count = ?deposit_count, "Registered pending claim");
        self.pending.lock().push(claim.clone());
        claim
    }

    /// Re-adds claims restored from a checkpoint.
    pub fn seed(&self, claims: Vec<PendingClaim>) {
        self.pending.lock().extend(claims);
    }

    pub fn pending(&self) -> Vec<PendingClaim> {
        self.pending.lock().clone()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Drains the pending set. Claims are not retried within a run.
    pub fn take_pending(&self) -> Vec<PendingClaim> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub async fn process_claims(&self, claims: Vec<PendingClaim>) -> Vec<ClaimResult> {
        let mut results = Vec::with_capacity(claims.len());
        for claim in claims {
            let outcome = match self.process_one(&claim).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(claim = %claim.label(), kind = e.kind(), error = %e, "Claim failed");
                    ClaimOutcome::Failed { kind: e.kind().to_string(), error: e.to_string() }
                }
            };
            results.push(ClaimResult { claim, outcome });
        }
        results
    }

    /// Claims transfers left unclaimed by earlier runs.
    pub async fn check_for_existing_claims(&self) -> Result<Vec<ClaimResult>> {
        let query = TransactionQuery { address: Some(self.wallet), limit: CLAIM_LOOKUP_LIMIT, sort: None };
        let transactions = self.router.get_transactions(&query).await?;
        let claims: Vec<PendingClaim> =
            transactions.iter().filter_map(|tx| self.existing_claim(tx)).collect();
        if claims.is_empty() {
            info!("No unclaimed transfers from previous runs");
            return Ok(Vec::new());
        }
        info!(count = claims.len(), "Processing unclaimed transfers from previous runs");
        Ok(self.process_claims(claims).await)
    }

    fn existing_claim(&self, tx: &IndexedTransaction) -> Option<PendingClaim> {
        if tx.status != STATUS_READY_TO_CLAIM || !tx.uses_protocol(&self.config.settings.claim_protocol) {
            return None;
        }
        let deposit_count = tx.deposit_count?;
        let sending = tx.sending.as_ref()?;
        let receiving = tx.receiving.as_ref()?;
        let source = self.config.chain_by_network(sending.network_id?)?;
        let destination = self.config.chain_by_network(receiving.network_id?)?;
        Some(PendingClaim {
            source_tx_hash: tx.transaction_hash.clone(),
            source_chain: source.key.clone(),
            source_network_id: source.network_id,
            destination_chain: destination.key.clone(),
            destination_network_id: destination.network_id,
            token: sending.token_symbol.clone().unwrap_or_default(),
            amount: sending.amount.clone().unwrap_or_default(),
            deposit_count: Some(deposit_count),
        })
    }

    async fn process_one(&self, claim: &PendingClaim) -> Result<ClaimOutcome> {
        let deposit_count = match claim.deposit_count {
            Some(count) => count,
            None => self
                .lookup_deposit(&claim.source_tx_hash, CLAIM_LOOKUP_LIMIT)
                .await?
                .ok_or_else(|| HarnessError::DepositNotIndexed { tx_hash: claim.source_tx_hash.clone() })?,
        };

        let destination = self.config.chain(&claim.destination_chain)?;
        let client = self.clients.get(&destination.key)?;

        if let Some(bridge_address) = destination.bridge_address {
            match self
                .bridge
                .is_claimed(destination.chain_id, bridge_address, deposit_count, claim.source_network_id)
                .await
            {
                Ok(true) => {
                    info!(claim = %claim.label(), deposit_count, "Already claimed");
                    return Ok(ClaimOutcome::AlreadyClaimed);
                }
                Ok(false) => {}
                Err(e) => debug!(error = %e, "isClaimed check failed, building claim anyway"),
            }
        }

        let raw = self.router.get_claim_unsigned_transaction(claim.source_network_id, deposit_count).await?;
        let tx = normalize(&raw, destination.chain_id)?;
        let execution = self.executor.execute(&tx, client.as_ref()).await?;
        if execution.simulated {
            return Ok(ClaimOutcome::Simulated { hash: execution.hash });
        }
        info!(claim = %claim.label(), tx_hash = %execution.hash, "Claim confirmed");
        Ok(ClaimOutcome::Claimed {
            hash: execution.hash,
            block_number: execution.block_number,
            gas_used: execution.gas_used,
        })
    }

    async fn lookup_deposit(&self, tx_hash: &str, limit: u32) -> Result<Option<u64>> {
        let query = TransactionQuery { address: Some(self.wallet), limit, sort: None };
        let transactions = self.router.get_transactions(&query).await?;
        Ok(transactions.iter().find(|tx| tx.matches_hash(tx_hash)).and_then(|tx| tx.deposit_count))
    }
}
