//! The busy coordinator: one busy state plus the gate that feeds it.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::busy::BusyState;
use crate::config::GateConfig;
use crate::gate::{gated_client, BusyLayer, GatedClient, OperationMeta, RequestGate, SkipPolicy};

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusySnapshot {
    pub busy: bool,
    pub in_flight: usize,
    pub active_keys: Vec<String>,
}

/// Explicitly constructed coordinator handle.
///
/// Clone it into every consumer that needs to count operations or observe
/// busy state; all clones share one counter and one flag.
#[derive(Debug, Clone)]
pub struct BusyCoordinator {
    state: BusyState,
    gate: RequestGate,
}

impl BusyCoordinator {
    pub fn new(policy: SkipPolicy) -> Self {
        let state = BusyState::new();
        let gate = RequestGate::new(state.clone(), policy);
        Self { state, gate }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(SkipPolicy::from_config(config))
    }

    pub fn state(&self) -> &BusyState {
        &self.state
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// Tower layer counting requests through this coordinator's gate.
    pub fn layer(&self) -> BusyLayer {
        BusyLayer::new(self.gate.clone())
    }

    /// Upstream HTTP client counted by this coordinator's gate.
    pub fn client(&self) -> GatedClient {
        gated_client(&self.gate)
    }

    /// Shorthand for [`RequestGate::wrap`].
    pub async fn wrap<F>(&self, op: &OperationMeta, execute: F) -> F::Output
    where
        F: Future,
    {
        self.gate.wrap(op, execute).await
    }

    pub fn snapshot(&self) -> BusySnapshot {
        BusySnapshot {
            busy: self.state.is_busy(),
            in_flight: self.gate.active_count(),
            active_keys: self.state.active_keys(),
        }
    }
}

impl Default for BusyCoordinator {
    fn default() -> Self {
        Self::new(SkipPolicy::default())
    }
}
