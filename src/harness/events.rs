//! Scenario state machine events.
//!
//! The orchestrator publishes every state transition to an [`EventSink`].
//! Logging is one sink among others; nothing reads state back from logs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::route::RouteMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioState {
    Pending,
    Routing,
    Approving,
    Executing,
    RegisteredForClaim,
    Done,
    Skipped,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScenarioState::Done | ScenarioState::Skipped | ScenarioState::Failed)
    }

    /// Allowed transitions of the scenario lifecycle.
    pub fn can_transition_to(self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Routing) | (Pending, Skipped) => true,
            (Routing, Approving) | (Routing, Executing) => true,
            (Approving, Executing) => true,
            (Executing, RegisteredForClaim) | (Executing, Done) => true,
            (RegisteredForClaim, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioState::Pending => "PENDING",
            ScenarioState::Routing => "ROUTING",
            ScenarioState::Approving => "APPROVING",
            ScenarioState::Executing => "EXECUTING",
            ScenarioState::RegisteredForClaim => "REGISTERED_FOR_CLAIM",
            ScenarioState::Done => "DONE",
            ScenarioState::Skipped => "SKIPPED",
            ScenarioState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub index: usize,
    pub label: String,
    pub from: ScenarioState,
    pub to: ScenarioState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<RouteMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Skip reason or failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ScenarioEvent);
}

/// Logs transitions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &ScenarioEvent) {
        match event.to {
            ScenarioState::Failed => warn!(
                scenario = %event.label,
                from = %event.from,
                error = event.detail.as_deref().unwrap_or(""),
                "Scenario failed"
            ),
            ScenarioState::Skipped => info!(
                scenario = %event.label,
                reason = event.detail.as_deref().unwrap_or(""),
                "Scenario skipped"
            ),
            to => info!(
                scenario = %event.label,
                state = %to,
                method = ?event.method,
                tx_hash = event.tx_hash.as_deref().unwrap_or(""),
                "Scenario transition"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScenarioEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScenarioEvent> {
        self.events.lock().clone()
    }

    /// States visited by scenario `index`, starting from `Pending`.
    pub fn path(&self, index: usize) -> Vec<ScenarioState> {
        let events = self.events.lock();
        let mut path = vec![ScenarioState::Pending];
        path.extend(events.iter().filter(|e| e.index == index).map(|e| e.to));
        path
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &ScenarioEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Tracks the current state of one scenario and publishes its transitions.
pub struct ScenarioTracker<'a> {
    index: usize,
    label: String,
    state: ScenarioState,
    sink: &'a dyn EventSink,
}

impl<'a> ScenarioTracker<'a> {
    pub fn new(index: usize, label: &str, sink: &'a dyn EventSink) -> Self {
        Self { index, label: label.to_string(), state: ScenarioState::Pending, sink }
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn advance(&mut self, to: ScenarioState) {
        self.emit(to, None, None, None);
    }

    pub fn advance_with(
        &mut self,
        to: ScenarioState,
        method: Option<RouteMethod>,
        tx_hash: Option<&str>,
        detail: Option<&str>,
    ) {
        self.emit(to, method, tx_hash, detail);
    }

    fn emit(&mut self, to: ScenarioState, method: Option<RouteMethod>, tx_hash: Option<&str>, detail: Option<&str>) {
        if !self.state.can_transition_to(to) {
            warn!(scenario = %self.label, from = %self.state, to = %to, "Unexpected scenario transition");
        }
        let event = ScenarioEvent {
            index: self.index,
            label: self.label.clone(),
            from: self.state,
            to,
            method,
            tx_hash: tx_hash.map(str::to_string),
            detail: detail.map(str::to_string),
        };
        self.state = to;
        self.sink.publish(&event);
    }
}
