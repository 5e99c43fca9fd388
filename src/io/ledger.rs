//! In-flight request ledger.
//!
//! Coalesces concurrent loads for the same key: the first caller (the
//! leader) runs the load, everyone arriving while it is outstanding joins
//! it and receives a clone of the same settled value.
//!
//! The record is removed as soon as the load settles, whatever the outcome,
//! so a failed load is retried by the next call instead of being cached.
//! If the leader's future is dropped before settling, the record is removed
//! as well and joined callers start over.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

type Slot<V> = Arc<watch::Sender<Option<V>>>;

/// Key -> in-flight load map implementing request coalescing.
///
/// Keys from unrelated namespaces may share a ledger as long as the key
/// type keeps them apart.
pub struct RequestLedger<K, V> {
    in_flight: Mutex<HashMap<K, Slot<V>>>,
}

enum Role<V> {
    Leader(Slot<V>),
    Follower(watch::Receiver<Option<V>>),
}

impl<K, V> RequestLedger<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `factory` for `key`, or join the load already in flight for it.
    pub async fn dedupe<F, Fut>(&self, key: K, factory: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let slot = loop {
            match self.claim(&key) {
                Role::Leader(slot) => break slot,
                Role::Follower(mut rx) => {
                    if let Ok(settled) = rx.wait_for(Option::is_some).await {
                        if let Some(value) = settled.as_ref() {
                            return value.clone();
                        }
                    }
                    // The leader was dropped without settling; try again.
                }
            }
        };

        let _guard = SettleGuard {
            ledger: self,
            key: &key,
            slot: &slot,
        };
        let value = factory().await;
        slot.send_replace(Some(value.clone()));
        value
    }

    /// Number of loads currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a load for `key` is currently in flight.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    fn claim(&self, key: &K) -> Role<V> {
        let mut in_flight = self.lock();
        if let Some(slot) = in_flight.get(key) {
            return Role::Follower(slot.subscribe());
        }

        let (tx, _) = watch::channel(None);
        let slot = Arc::new(tx);
        in_flight.insert(key.clone(), slot.clone());
        Role::Leader(slot)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for RequestLedger<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the leader's record when the load settles or is dropped.
struct SettleGuard<'a, K: Eq + Hash + Clone, V: Clone> {
    ledger: &'a RequestLedger<K, V>,
    key: &'a K,
    slot: &'a Slot<V>,
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for SettleGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut in_flight = self.ledger.lock();
        // Only remove our own record; a newer leader may own the key now.
        if in_flight
            .get(self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, self.slot))
        {
            in_flight.remove(self.key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
