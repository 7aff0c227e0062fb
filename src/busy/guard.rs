//! Scoped named sub-states.

use crate::busy::state::BusyState;

/// RAII guard that keeps a named key active.
///
/// Keys are presence-based, not counted: two guards for the same key end
/// the sub-state as soon as the first one drops.
#[must_use = "dropping a KeyGuard ends the named operation immediately"]
#[derive(Debug)]
pub struct KeyGuard {
    state: BusyState,
    key: String,
}

impl KeyGuard {
    pub(crate) fn new(state: BusyState, key: String) -> Self {
        state.set_for(&key, true);
        Self { state, key }
    }

    /// The tracked key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.state.set_for(&self.key, false);
    }
}
