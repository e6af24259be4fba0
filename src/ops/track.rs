//! Follows one transaction: its receipt on the source chain and its bridge
//! status in the router's indexer.

use ethers::types::Address;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::blockchain::traits::{ChainClient, Router};
use crate::blockchain::types::{IndexedTransaction, TransactionQuery, TxReceiptInfo};
use crate::core::errors::Result;
use crate::harness::claims::CLAIM_LOOKUP_LIMIT;

/// Indexer status of a transfer whose claim has landed.
pub const STATUS_CLAIMED: &str = "CLAIMED";

#[derive(Debug, Clone)]
pub struct TrackOptions {
    pub watch: bool,
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self { watch: false, interval: Duration::from_secs(15), max_polls: 40 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackStatus {
    pub hash: String,
    pub receipt: Option<TxReceiptInfo>,
    pub indexed: Option<IndexedTransaction>,
    pub polls: u32,
}

impl TrackStatus {
    /// Nothing more will change: claimed, or reverted at the source.
    pub fn is_settled(&self) -> bool {
        let reverted = self.receipt.as_ref().map(|r| !r.succeeded()).unwrap_or(false);
        let claimed = self.indexed.as_ref().map(|t| t.status.eq_ignore_ascii_case(STATUS_CLAIMED)).unwrap_or(false);
        reverted || claimed
    }
}

/// Polls once, or until settled when watching. Indexer failures are logged
/// and the previous indexer state is kept.
pub async fn track_transaction(
    client: &dyn ChainClient,
    router: &dyn Router,
    owner: Option<Address>,
    hash: &str,
    options: &TrackOptions,
) -> Result<TrackStatus> {
    let mut status = TrackStatus { hash: hash.to_string(), ..Default::default() };
    let max_polls = if options.watch { options.max_polls.max(1) } else { 1 };

    for poll in 1..=max_polls {
        if poll > 1 {
            tokio::time::sleep(options.interval).await;
        }
        status.polls = poll;
        status.receipt = client.get_receipt(hash).await?;

        let query = TransactionQuery { address: owner, limit: CLAIM_LOOKUP_LIMIT, sort: None };
        match router.get_transactions(&query).await {
            Ok(transactions) => {
                if let Some(found) = transactions.into_iter().find(|t| t.matches_hash(hash)) {
                    status.indexed = Some(found);
                }
            }
            Err(e) => warn!(error = %e, "Indexer query failed"),
        }

        debug!(
            check = poll,
            included = status.receipt.is_some(),
            bridge_status = status.indexed.as_ref().map(|t| t.status.as_str()).unwrap_or("unknown"),
            "Status check"
        );
        if status.is_settled() {
            info!(tx_hash = %hash, "Transaction settled");
            break;
        }
    }
    Ok(status)
}

pub fn log_status(status: &TrackStatus) {
    match &status.receipt {
        Some(receipt) => info!(
            tx_hash = %status.hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            success = receipt.succeeded(),
            "Receipt"
        ),
        None => info!(tx_hash = %status.hash, "Not yet included"),
    }
    match &status.indexed {
        Some(tx) => info!(status = %tx.status, deposit_count = ?tx.deposit_count, "Bridge status"),
        None => info!("Not indexed by the router yet"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::mock::{MockChainClient, MockRouter};
    use crate::blockchain::types::STATUS_READY_TO_CLAIM;

    fn indexed(status: &str) -> IndexedTransaction {
        IndexedTransaction {
            transaction_hash: "0xfeed".to_string(),
            status: status.to_string(),
            deposit_count: Some(3),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn single_poll_without_watch() {
        let router = MockRouter::new().with_transactions(vec![indexed(STATUS_READY_TO_CLAIM)]);
        let client = MockChainClient::new(1, Address::zero());
        let status = track_transaction(&client, &router, None, "0xFEED", &TrackOptions::default()).await.unwrap();
        assert_eq!(status.polls, 1);
        assert!(status.receipt.is_none());
        assert_eq!(status.indexed.unwrap().deposit_count, Some(3));
    }

    #[tokio::test]
    async fn watch_stops_once_claimed() {
        let router = MockRouter::new().with_transactions(vec![indexed(STATUS_CLAIMED)]);
        router.queue_transactions(vec![]);
        router.queue_transactions(vec![indexed(STATUS_READY_TO_CLAIM)]);
        let client = MockChainClient::new(1, Address::zero());
        let options = TrackOptions { watch: true, interval: Duration::ZERO, max_polls: 10 };

        let status = track_transaction(&client, &router, None, "0xfeed", &options).await.unwrap();
        assert_eq!(status.polls, 3);
        assert!(status.is_settled());
    }

    #[tokio::test]
    async fn watch_gives_up_after_max_polls() {
        let router = MockRouter::new().with_transactions(vec![indexed(STATUS_READY_TO_CLAIM)]);
        let client = MockChainClient::new(1, Address::zero());
        let options = TrackOptions { watch: true, interval: Duration::ZERO, max_polls: 4 };

        let status = track_transaction(&client, &router, None, "0xfeed", &options).await.unwrap();
        assert_eq!(status.polls, 4);
        assert!(!status.is_settled());
    }
}
