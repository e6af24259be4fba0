//! Bridge transfer lifecycle: routing, approval, normalization, submission
//! and deferred claiming, driven scenario by scenario.

pub mod approval;
pub mod checkpoint;
pub mod claims;
pub mod events;
pub mod executor;
pub mod normalizer;
pub mod orchestrator;
pub mod report;
pub mod route;

use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::traits::ChainClient;
use crate::core::errors::{HarnessError, Result};

pub use approval::{ApprovalManager, ApprovalOutcome};
pub use checkpoint::{CheckpointLog, CheckpointRecord, CheckpointState};
pub use claims::{ClaimOutcome, ClaimResult, ClaimTracker, PendingClaim, TransferRecord};
pub use events::{EventSink, RecordingSink, ScenarioEvent, ScenarioState, TracingSink};
pub use executor::{ExecutionResult, TransactionExecutor};
pub use normalizer::normalize;
pub use orchestrator::{RunOptions, ScenarioOrchestrator};
pub use report::{RunReport, RunSummary, TestResult, TestStatus};
pub use route::{RouteContext, RouteMethod, RouteOutcome, RouteResolver};

/// Chain clients keyed by chain key. Clones share the clients.
#[derive(Clone, Default)]
pub struct ChainClients {
    clients: HashMap<String, Arc<dyn ChainClient>>,
}

impl ChainClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, client: Arc<dyn ChainClient>) {
        self.clients.insert(key.to_string(), client);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn ChainClient>> {
        self.clients
            .get(key)
            .cloned()
            .ok_or_else(|| HarnessError::Config(format!("no chain client for {}", key)))
    }
}
