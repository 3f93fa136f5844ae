//! Stale-while-revalidate engine and per-consumer bindings.
//!
//! An [`Swr`] owns one cache store, one fetcher and one revalidation
//! controller. It is created explicitly and handed to every consumer; all
//! clones share the same cache. A [`Binding`] ties one consumer to a key and
//! its fetch function, and turns mount, refresh, focus and polling ticks into
//! stimuli for the controller.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::FetchError;
use crate::cache::{CacheEntry, CacheKey, CacheStats, CacheStore, Subscription};
use crate::config::{StoreOptions, SwrOptions};
use crate::fetcher::{FetchResult, Fetcher, FetcherStats};
use crate::revalidate::{Decision, KeyState, RevalidationController, Stimulus};

/// Type-erased fetch operation bound to one key.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Outcome of one stimulus.
#[derive(Debug)]
pub enum Revalidation<T> {
    /// This stimulus started a fetch.
    Started(FetchResult<T>),
    /// A fetch was already running; its result was shared.
    Joined(FetchResult<T>),
    /// Inside the dedupe window; no fetch was made.
    Deduped(Option<CacheEntry<T>>),
    /// The stimulus is disabled by configuration.
    Ignored,
}

impl<T> Revalidation<T> {
    /// Whether a fetch result was observed, started here or joined.
    pub fn fetched(&self) -> bool {
        matches!(self, Self::Started(_) | Self::Joined(_))
    }

    /// The fetch result, if one was observed.
    pub fn result(&self) -> Option<&FetchResult<T>> {
        match self {
            Self::Started(result) | Self::Joined(result) => Some(result),
            Self::Deduped(_) | Self::Ignored => None,
        }
    }
}

/// Engine-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwrStats {
    pub cache: CacheStats,
    pub fetcher: FetcherStats,
    /// Stimuli absorbed by the dedupe window.
    pub deduped: u64,
}

struct Inner<T> {
    store: Arc<CacheStore<T>>,
    fetcher: Fetcher<T>,
    controller: RevalidationController,
    deduped: AtomicU64,
}

/// Shared handle to one engine instance.
pub struct Swr<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Swr<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Swr<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(options: SwrOptions, store_options: StoreOptions) -> Self {
        let store = Arc::new(CacheStore::new(store_options));
        let fetcher = Fetcher::new(Arc::clone(&store));
        Self {
            inner: Arc::new(Inner {
                store,
                fetcher,
                controller: RevalidationController::new(options),
                deduped: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &SwrOptions {
        self.inner.controller.options()
    }

    pub fn store(&self) -> &CacheStore<T> {
        &self.inner.store
    }

    /// Current entry for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        self.inner.store.get(key)
    }

    /// Current revalidation state of `key`.
    pub fn state(&self, key: &CacheKey) -> KeyState {
        let entry = self.inner.store.get(key);
        self.inner.controller.state(entry.as_ref(), self.inner.fetcher.is_inflight(key), Instant::now())
    }

    /// Bind a consumer to `key`, fetched with `fetch`.
    pub fn bind<F, Fut>(&self, key: CacheKey, fetch: F) -> Binding<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move || fetch().boxed());
        Binding { swr: self.clone(), key, fetch, poller: None, subscriptions: Vec::new() }
    }

    /// Feed one stimulus for `key` through the controller.
    pub async fn revalidate(&self, key: &CacheKey, stimulus: Stimulus, fetch: &FetchFn<T>) -> Revalidation<T> {
        let inner = &self.inner;
        if !inner.controller.accepts(stimulus) {
            tracing::debug!(key = key.short(), ?stimulus, "stimulus disabled");
            return Revalidation::Ignored;
        }

        let mut decision = Decision::Join;
        let attached = inner.fetcher.attach_if(key, || fetch(), || {
            let entry = inner.store.get(key);
            let state = inner.controller.state(entry.as_ref(), false, Instant::now());
            decision = inner.controller.decide(stimulus, state);
            decision == Decision::Fetch
        });

        match attached {
            Some(inflight) if inflight.started_here() => Revalidation::Started(inflight.wait().await),
            Some(inflight) => {
                tracing::debug!(key = key.short(), ?stimulus, "refresh already in progress");
                Revalidation::Joined(inflight.wait().await)
            }
            None => {
                inner.deduped.fetch_add(1, Ordering::Relaxed);
                let entry = inner.store.get(key);
                tracing::debug!(
                    key = key.short(),
                    ?stimulus,
                    ?decision,
                    cooldown_ms = inner.controller.cooldown_remaining(entry.as_ref(), Instant::now()).as_millis() as u64,
                    "revalidation deduped"
                );
                Revalidation::Deduped(entry)
            }
        }
    }

    pub fn stats(&self) -> SwrStats {
        SwrStats {
            cache: self.inner.store.stats(),
            fetcher: self.inner.fetcher.stats(),
            deduped: self.inner.deduped.load(Ordering::Relaxed),
        }
    }
}

/// One consumer's view of a key.
///
/// Dropping the binding unmounts it: polling stops and its subscriptions are
/// deregistered. A fetch already in flight still completes into the cache.
pub struct Binding<T> {
    swr: Swr<T>,
    key: CacheKey,
    fetch: FetchFn<T>,
    poller: Option<JoinHandle<()>>,
    subscriptions: Vec<Subscription<T>>,
}

impl<T> Binding<T>
where
    T: Send + Sync + 'static,
{
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Current entry for the bound key.
    pub fn entry(&self) -> Option<CacheEntry<T>> {
        self.swr.get(&self.key)
    }

    pub fn state(&self) -> KeyState {
        self.swr.state(&self.key)
    }

    /// Initial revalidation when the consumer appears.
    pub async fn mount(&self) -> Revalidation<T> {
        self.swr.revalidate(&self.key, Stimulus::Mount, &self.fetch).await
    }

    /// Manual refresh. Subject to the dedupe window like any other stimulus.
    pub async fn refresh(&self) -> Revalidation<T> {
        self.swr.revalidate(&self.key, Stimulus::ManualTrigger, &self.fetch).await
    }

    /// The consumer regained foreground.
    pub async fn focus(&self) -> Revalidation<T> {
        self.swr.revalidate(&self.key, Stimulus::Focus, &self.fetch).await
    }

    /// One automatic polling tick.
    pub async fn tick(&self) -> Revalidation<T> {
        self.swr.revalidate(&self.key, Stimulus::AutomaticTick, &self.fetch).await
    }

    /// Call `callback` on every change of the bound key until unmount.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let subscription = self.swr.store().subscribe(&self.key, callback);
        self.subscriptions.push(subscription);
    }

    /// Start automatic polling every `refresh_interval`.
    ///
    /// Returns false when polling is disabled or already running.
    pub fn start_polling(&mut self) -> bool {
        let period = self.swr.options().refresh_interval;
        if period.is_zero() || self.poller.is_some() {
            return false;
        }

        let swr = self.swr.clone();
        let key = self.key.clone();
        let fetch = Arc::clone(&self.fetch);

        self.poller = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let outcome = swr.revalidate(&key, Stimulus::AutomaticTick, &fetch).await;
                tracing::debug!(key = key.short(), fetched = outcome.fetched(), "polling tick");
            }
        }));
        tracing::info!(key = self.key.short(), period_ms = period.as_millis() as u64, "polling started");
        true
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Stop polling and deregister subscriptions.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<T> Drop for Binding<T> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.subscriptions.clear();
    }
}
