//! Aggregate busy flag, named sub-states and subscriber fan-out.
//!
//! # Responsibilities
//! - Hold the aggregate busy flag
//! - Hold the set of active named keys
//! - Deliver every change to registered subscribers, in publish order
//! - Expose a watch channel for async consumers (websocket push)
//!
//! # Design Decisions
//! - Changes are queued under the lock and delivered after it is released
//! - One thread at a time drains the queue, which keeps delivery in publish
//!   order across threads
//! - A change published from inside a callback is queued behind the one
//!   being delivered

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

use crate::busy::guard::KeyGuard;
use crate::observability::metrics;

type Handler = Arc<dyn Fn(bool) + Send + Sync>;

struct Subscriber {
    id: u64,
    /// Sequence number of this subscriber's replay. Only later broadcasts
    /// reach it.
    since: u64,
    handler: Handler,
}

struct Delivery {
    seq: u64,
    busy: bool,
    /// Replay addressed to one new subscriber.
    only: Option<u64>,
}

struct Inner {
    busy: bool,
    keys: BTreeSet<String>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    seq: u64,
    queue: VecDeque<Delivery>,
    draining: bool,
    tx: watch::Sender<bool>,
}

impl Inner {
    fn publish(&mut self, busy: bool) {
        if self.busy == busy {
            return;
        }
        self.busy = busy;
        self.tx.send_replace(busy);
        metrics::set_busy(busy);
        tracing::debug!(busy, subscribers = self.subscribers.len(), "Busy state changed");

        self.enqueue(busy, None);
    }

    fn enqueue(&mut self, busy: bool, only: Option<u64>) -> u64 {
        self.seq += 1;
        self.queue.push_back(Delivery {
            seq: self.seq,
            busy,
            only,
        });
        self.seq
    }

    /// Take over delivery if there is work and nobody else is delivering.
    fn claim_drain(&mut self) -> bool {
        if self.draining || self.queue.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    fn next_delivery(&mut self) -> Option<(bool, Vec<Handler>)> {
        let Some(delivery) = self.queue.pop_front() else {
            self.draining = false;
            return None;
        };
        let handlers = self
            .subscribers
            .iter()
            .filter(|s| match delivery.only {
                Some(id) => s.id == id,
                None => s.since < delivery.seq,
            })
            .map(|s| s.handler.clone())
            .collect();
        Some((delivery.busy, handlers))
    }
}

/// Shared busy state.
///
/// Cloning is cheap and every clone observes the same flag. Subscriber
/// callbacks run with no internal lock held, so they may read the state,
/// mutate it, or query the gate that feeds it.
#[derive(Clone)]
pub struct BusyState {
    inner: Arc<Mutex<Inner>>,
}

impl BusyState {
    /// Create an idle state with no active keys.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                busy: false,
                keys: BTreeSet::new(),
                subscribers: Vec::new(),
                next_id: 0,
                seq: 0,
                queue: VecDeque::new(),
                draining: false,
                tx,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking subscriber must not wedge the gate's release path.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, then deliver whatever it queued.
    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, drain) = {
            let mut inner = self.lock();
            let result = f(&mut inner);
            let drain = inner.claim_drain();
            (result, drain)
        };
        if drain {
            self.drain();
        }
        result
    }

    fn drain(&self) {
        let _reset = DrainReset(self);
        loop {
            let next = self.lock().next_delivery();
            let Some((busy, handlers)) = next else {
                break;
            };
            for handler in handlers {
                handler(busy);
            }
        }
    }

    /// Run `f` under the state lock and publish the value it returns, if any.
    ///
    /// The gate changes its count inside `f`, so count changes and the
    /// publishes they cause are ordered together.
    pub(crate) fn publish_with<R>(&self, f: impl FnOnce() -> (Option<bool>, R)) -> R {
        self.mutate(|inner| {
            let (busy, result) = f();
            if let Some(busy) = busy {
                inner.publish(busy);
            }
            result
        })
    }

    /// Overwrite the aggregate flag.
    pub fn set_global(&self, busy: bool) {
        self.mutate(|inner| inner.publish(busy));
    }

    /// Mark a named operation active or inactive, then recompute the flag
    /// as "any key active".
    ///
    /// Removing a key that is not present changes nothing and publishes
    /// nothing.
    pub fn set_for(&self, key: &str, active: bool) {
        self.mutate(|inner| {
            if active {
                if inner.keys.insert(key.to_string()) {
                    tracing::debug!(key, "Named operation started");
                }
            } else if inner.keys.remove(key) {
                tracing::debug!(key, "Named operation finished");
            } else {
                return;
            }
            let busy = !inner.keys.is_empty();
            inner.publish(busy);
        });
    }

    /// Whether `key` is currently active.
    pub fn get_for(&self, key: &str) -> bool {
        self.lock().keys.contains(key)
    }

    /// Drop every named key and publish idle.
    ///
    /// Counted operations still in flight are not touched; their eventual
    /// release will find the flag already idle.
    pub fn clear_all(&self) {
        self.mutate(|inner| {
            let cleared = inner.keys.len();
            inner.keys.clear();
            inner.publish(false);
            tracing::info!(cleared, "Busy state cleared");
        });
    }

    /// Current aggregate flag.
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Active keys in sorted order.
    pub fn active_keys(&self) -> Vec<String> {
        self.lock().keys.iter().cloned().collect()
    }

    /// Register a callback.
    ///
    /// The callback is invoked with the current value, then once per
    /// change. The first call happens before this returns unless another
    /// thread is mid-delivery, in which case that thread makes it ahead of
    /// any later change. Delivery stops when the returned [`Subscription`]
    /// is dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.mutate(|inner| {
            let id = inner.next_id;
            inner.next_id += 1;

            let current = inner.busy;
            let since = inner.enqueue(current, Some(id));
            inner.subscribers.push(Subscriber {
                id,
                since,
                handler: Arc::new(handler),
            });
            id
        });

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Latest-value receiver. Intermediate values may be coalesced.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.lock().tx.subscribe()
    }

    /// Mark `key` active until the returned guard is dropped.
    pub fn track(&self, key: impl Into<String>) -> KeyGuard {
        KeyGuard::new(self.clone(), key.into())
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl Default for BusyState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BusyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("BusyState")
            .field("busy", &inner.busy)
            .field("keys", &inner.keys)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// Hands delivery back if a subscriber panics mid-drain; the next
/// mutation picks up whatever is still queued.
struct DrainReset<'a>(&'a BusyState);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// Handle for a registered subscriber. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<Inner>>,
}

impl Subscription {
    /// Stop delivery to this subscriber.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|s| s.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(state: &BusyState) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = state.subscribe(move |busy| sink.lock().unwrap().push(busy));
        (seen, sub)
    }

    #[test]
    fn keyed_aggregation() {
        let state = BusyState::new();

        state.set_for("rebalance", true);
        assert!(state.is_busy());

        state.set_for("other", true);
        assert!(state.is_busy());

        state.set_for("rebalance", false);
        assert!(state.is_busy(), "other is still active");
        assert!(!state.get_for("rebalance"));
        assert!(state.get_for("other"));

        state.set_for("other", false);
        assert!(!state.is_busy());
        assert!(state.active_keys().is_empty());
    }

    #[test]
    fn removing_absent_key_is_silent() {
        let state = BusyState::new();
        let (seen, _sub) = recorder(&state);

        state.set_for("missing", false);
        assert!(!state.get_for("missing"));
        assert_eq!(*seen.lock().unwrap(), vec![false]);

        // Must not clobber a flag raised by the gate path either.
        state.set_global(true);
        state.set_for("missing", false);
        assert!(state.is_busy());
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn set_then_unset_restores_prior_state() {
        let state = BusyState::new();
        state.set_for("y", true);
        let keys_before = state.active_keys();
        let busy_before = state.is_busy();

        state.set_for("x", true);
        state.set_for("x", false);

        assert_eq!(state.active_keys(), keys_before);
        assert_eq!(state.is_busy(), busy_before);
    }

    #[test]
    fn subscribe_replays_latest_value() {
        let state = BusyState::new();
        state.set_for("load", true);

        let (seen, _sub) = recorder(&state);
        assert_eq!(*seen.lock().unwrap(), vec![true]);

        state.set_for("load", false);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn publishes_only_transitions() {
        let state = BusyState::new();
        let (seen, _sub) = recorder(&state);

        state.set_global(true);
        state.set_global(true);
        state.set_for("a", true);
        state.set_global(false);
        state.set_global(false);

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let state = BusyState::new();
        let (seen, sub) = recorder(&state);
        assert_eq!(state.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(state.subscriber_count(), 0);

        state.set_global(true);
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn clear_all_empties_keys() {
        let state = BusyState::new();
        state.set_for("a", true);
        state.set_for("b", true);

        state.clear_all();

        assert!(!state.is_busy());
        assert!(state.active_keys().is_empty());
    }

    #[test]
    fn track_releases_key_on_drop() {
        let state = BusyState::new();
        {
            let _guard = state.track("createPortfolio");
            assert!(state.get_for("createPortfolio"));
            assert!(state.is_busy());
        }
        assert!(!state.get_for("createPortfolio"));
        assert!(!state.is_busy());
    }

    #[tokio::test]
    async fn watch_sees_latest_value() {
        let state = BusyState::new();
        let mut rx = state.watch();
        assert!(!*rx.borrow_and_update());

        state.set_for("rebalance", true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn callbacks_may_read_and_mutate_state() {
        let state = BusyState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (sink, inner) = (seen.clone(), state.clone());
        let _sub = state.subscribe(move |busy| {
            sink.lock().unwrap().push((busy, inner.is_busy(), inner.active_keys()));
            if busy && inner.get_for("load") {
                inner.set_for("load", false);
            }
        });

        state.set_for("load", true);

        assert!(!state.is_busy());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (false, false, vec![]),
                (true, true, vec!["load".to_string()]),
                (false, false, vec![]),
            ]
        );
    }

    #[test]
    fn panicking_subscriber_does_not_stall_delivery() {
        let state = BusyState::new();
        let (seen, _sub) = recorder(&state);
        let bomb = state.subscribe(|busy| {
            if busy {
                panic!("subscriber failed");
            }
        });

        let s = state.clone();
        assert!(std::thread::spawn(move || s.set_global(true)).join().is_err());
        drop(bomb);

        state.set_global(false);
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }
}
