//! In-memory cache store with synchronous change notification.
//!
//! Each key owns a slot holding its entry and its subscribers. All mutation
//! goes through [`CacheStore::set`], which takes the slot's gate for the whole
//! apply-and-notify sequence, so subscribers of a key see mutations one at a
//! time and in the order they were applied.
//!
//! Callbacks run on the thread that called `set`. They may read the store but
//! must not call `set` for the key they observe, nor unsubscribe themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::entry::{CacheEntry, Mutation};
use super::key::CacheKey;
use crate::config::StoreOptions;

type Callback<T> = Box<dyn Fn(&CacheEntry<T>) + Send + Sync>;

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Subscriber<T> {
    id: u64,
    callback: Mutex<Option<Callback<T>>>,
}

impl<T> Subscriber<T> {
    fn notify(&self, entry: &CacheEntry<T>) {
        if let Some(callback) = lock(&self.callback).as_ref() {
            callback(entry);
        }
    }
}

struct KeySlot<T> {
    entry: RwLock<Option<CacheEntry<T>>>,
    subscribers: Mutex<Vec<Arc<Subscriber<T>>>>,
    gate: Mutex<()>,
}

impl<T> KeySlot<T> {
    fn new() -> Self {
        Self { entry: RwLock::new(None), subscribers: Mutex::new(Vec::new()), gate: Mutex::new(()) }
    }

    fn snapshot(&self) -> Option<CacheEntry<T>> {
        self.entry.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Neither validating, observed, nor in the middle of a `set`.
    fn is_idle(&self) -> bool {
        if matches!(self.gate.try_lock(), Err(TryLockError::WouldBlock)) {
            return false;
        }
        let validating = self.snapshot().is_some_and(|e| e.is_validating);
        !validating && self.subscriber_count() == 0
    }
}

/// Registration returned by [`CacheStore::subscribe`].
///
/// Dropping it unsubscribes.
pub struct Subscription<T> {
    slot: Arc<KeySlot<T>>,
    subscriber: Arc<Subscriber<T>>,
}

impl<T> Subscription<T> {
    /// Deregister the callback.
    ///
    /// Blocks while a notification to this subscriber is running, and
    /// guarantees no callback invocation after it returns.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        lock(&self.subscriber.callback).take();
        let id = self.subscriber.id;
        lock(&self.slot.subscribers).retain(|s| s.id != id);
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub validating_entries: usize,
    pub errored_entries: usize,
    pub subscribers: usize,
}

/// Process-local cache of the latest state per key.
pub struct CacheStore<T> {
    slots: DashMap<CacheKey, Arc<KeySlot<T>>>,
    options: StoreOptions,
    next_subscriber: AtomicU64,
}

impl<T> CacheStore<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(options: StoreOptions) -> Self {
        Self { slots: DashMap::new(), options, next_subscriber: AtomicU64::new(0) }
    }

    /// Current entry for `key`, or `None` if it has never been set.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let slot = self.slots.get(key).map(|s| Arc::clone(s.value()))?;
        slot.snapshot()
    }

    /// Apply a mutation to `key` and notify its subscribers with the result.
    ///
    /// Returns the post-mutation entry.
    pub fn set(&self, key: &CacheKey, mutation: Mutation<T>) -> CacheEntry<T> {
        loop {
            let slot = self.slot(key);
            let _gate = lock(&slot.gate);
            // Evicted between lookup and gate: retry on a fresh slot.
            if !self.is_current(key, &slot) {
                continue;
            }

            let snapshot = {
                let mut guard = slot.entry.write().unwrap_or_else(PoisonError::into_inner);
                let entry = guard.get_or_insert_with(CacheEntry::default);
                entry.apply(mutation);
                entry.clone()
            };

            let subscribers = lock(&slot.subscribers).clone();
            for subscriber in subscribers {
                subscriber.notify(&snapshot);
            }

            return snapshot;
        }
    }

    /// Register `callback` for every future `set` on `key`.
    pub fn subscribe<F>(&self, key: &CacheKey, callback: F) -> Subscription<T>
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let subscriber = Arc::new(Subscriber {
            id: self.next_subscriber.fetch_add(1, Ordering::Relaxed),
            callback: Mutex::new(Some(Box::new(callback))),
        });
        loop {
            let slot = self.slot(key);
            lock(&slot.subscribers).push(Arc::clone(&subscriber));
            if self.is_current(key, &slot) {
                tracing::debug!(key = key.short(), "subscriber registered");
                return Subscription { slot, subscriber };
            }
            lock(&slot.subscribers).retain(|s| s.id != subscriber.id);
        }
    }

    /// Number of tracked keys, including keys that only have subscribers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every key that is neither validating nor subscribed.
    ///
    /// Returns the number of removed keys.
    pub fn clear(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_idle());
        let removed = before.saturating_sub(self.slots.len());
        tracing::info!(removed, "cache cleared");
        removed
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for slot in self.slots.iter() {
            stats.subscribers += slot.subscriber_count();
            if let Some(entry) = slot.snapshot() {
                stats.total_entries += 1;
                if entry.is_validating {
                    stats.validating_entries += 1;
                }
                if entry.error.is_some() {
                    stats.errored_entries += 1;
                }
            }
        }
        stats
    }

    fn is_current(&self, key: &CacheKey, slot: &Arc<KeySlot<T>>) -> bool {
        self.slots.get(key).is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    fn slot(&self, key: &CacheKey) -> Arc<KeySlot<T>> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }

        if self.options.max_entries > 0 && self.slots.len() >= self.options.max_entries {
            self.evict_oldest();
        }

        Arc::clone(self.slots.entry(key.clone()).or_insert_with(|| Arc::new(KeySlot::new())).value())
    }

    /// Evict idle keys, oldest fetch first, until there is room for one more.
    fn evict_oldest(&self) {
        let mut candidates: Vec<_> = self
            .slots
            .iter()
            .filter(|slot| slot.is_idle())
            .map(|slot| (slot.key().clone(), slot.snapshot().and_then(|e| e.last_fetch_started_at)))
            .collect();

        candidates.sort_by_key(|(_, started)| *started);

        let excess = (self.slots.len() + 1).saturating_sub(self.options.max_entries);
        let mut evicted = 0;
        for (key, _) in candidates.into_iter().take(excess) {
            if self.slots.remove_if(&key, |_, slot| slot.is_idle()).is_some() {
                evicted += 1;
            }
        }

        if evicted < excess {
            tracing::warn!(
                evicted,
                max_entries = self.options.max_entries,
                "cache over capacity; remaining keys are validating or subscribed"
            );
        } else {
            tracing::debug!(evicted, "evicted oldest idle cache entries");
        }
    }
}

impl<T> Default for CacheStore<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}
