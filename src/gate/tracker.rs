//! In-flight operation counting.
//!
//! # Responsibilities
//! - Evaluate the skip policy per operation
//! - Count in-flight counted operations
//! - Raise the busy flag on entry, lower it when the count returns to zero
//! - Release exactly once per entry on every exit path
//!
//! # Design Decisions
//! - Entry and release change the count inside the busy state's lock, so
//!   the flag can never be published out of order with the count
//! - Lock order is always state, then count. Subscriber callbacks run after
//!   both are released and may call `active_count`
//! - Release lives in `Drop`, which covers errors, panics and futures
//!   dropped mid-flight
//! - The policy sits behind `ArcSwap` so config reloads never block entry

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use axum::http::HeaderMap;

use crate::busy::BusyState;
use crate::gate::operation::{OperationId, OperationMeta};
use crate::gate::policy::SkipPolicy;
use crate::observability::metrics;

#[derive(Debug)]
struct GateInner {
    active: Mutex<usize>,
    state: BusyState,
    policy: ArcSwap<SkipPolicy>,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: OperationId) {
        let remaining = self.state.publish_with(|| {
            let mut active = self.lock();
            if *active == 0 {
                return (None, None);
            }
            *active -= 1;
            metrics::set_in_flight(*active);
            ((*active == 0).then_some(false), Some(*active))
        });

        match remaining {
            Some(active) => tracing::trace!(operation_id = %id, active, "Operation released"),
            None => {
                tracing::error!(operation_id = %id, "Release without matching entry; count left at zero");
                metrics::record_underflow();
            }
        }
    }
}

/// Counts in-flight operations and drives the global busy flag.
///
/// Cloning yields another handle to the same counter.
#[derive(Debug, Clone)]
pub struct RequestGate {
    inner: Arc<GateInner>,
}

impl RequestGate {
    /// Create a gate publishing into `state`.
    pub fn new(state: BusyState, policy: SkipPolicy) -> Self {
        Self {
            inner: Arc::new(GateInner {
                active: Mutex::new(0),
                state,
                policy: ArcSwap::from_pointee(policy),
            }),
        }
    }

    /// True if `op` is exempt from busy tracking.
    pub fn should_skip(&self, op: &OperationMeta) -> bool {
        self.inner.policy.load().should_skip(op)
    }

    /// Count `op` unless the policy skips it.
    ///
    /// The count is held until the returned guard is dropped.
    pub fn enter(&self, op: &OperationMeta) -> Option<BusyGuard> {
        if self.should_skip(op) {
            metrics::record_operation(false);
            tracing::trace!(target_path = %op.path(), "Operation skipped by policy");
            return None;
        }
        metrics::record_operation(true);

        let id = OperationId::new();
        let active = self.inner.state.publish_with(|| {
            let mut active = self.inner.lock();
            *active += 1;
            metrics::set_in_flight(*active);
            (Some(true), *active)
        });
        tracing::trace!(operation_id = %id, target_path = %op.path(), active, "Operation counted");

        Some(BusyGuard {
            gate: self.inner.clone(),
            id,
        })
    }

    /// Run `execute` as operation `op`.
    ///
    /// The output, including any error, is returned unchanged. The count is
    /// released however `execute` ends, including when this future is
    /// dropped before completion.
    pub async fn wrap<F>(&self, op: &OperationMeta, execute: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.enter(op);
        execute.await
    }

    /// Number of counted operations currently in flight.
    pub fn active_count(&self) -> usize {
        *self.inner.lock()
    }

    /// Swap in a new skip policy. In-flight operations are unaffected.
    pub fn update_policy(&self, policy: SkipPolicy) {
        tracing::info!(
            skip_header = %policy.skip_header(),
            quiet_paths = ?policy.quiet_paths(),
            "Skip policy updated"
        );
        self.inner.policy.store(Arc::new(policy));
    }

    /// Current skip policy.
    pub fn policy(&self) -> Arc<SkipPolicy> {
        self.inner.policy.load_full()
    }

    /// Remove marker headers before a request leaves the process.
    pub fn strip_markers(&self, headers: &mut HeaderMap) {
        self.inner.policy.load().strip_markers(headers);
    }

    /// The busy state this gate publishes into.
    pub fn state(&self) -> &BusyState {
        &self.inner.state
    }
}

/// Holds one unit of the gate's in-flight count. Releases on drop.
#[must_use = "dropping a BusyGuard releases the operation immediately"]
#[derive(Debug)]
pub struct BusyGuard {
    gate: Arc<GateInner>,
    id: OperationId,
}

impl BusyGuard {
    pub fn id(&self) -> OperationId {
        self.id
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.gate.release(self.id);
    }
}
