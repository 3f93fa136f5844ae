//! Request coalescing.
//!
//! At most one fetch is outstanding per key. The first caller registers an
//! in-flight record holding a shared handle to the result; callers arriving
//! before completion attach to that handle instead of starting a second
//! fetch. The fetch itself runs on its own task, so it completes and updates
//! the cache even if every caller stops waiting.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::FetchError;
use crate::cache::{CacheKey, CacheStore, Mutation};

/// Outcome shared by every caller of one fetch.
pub type FetchResult<T> = Result<Arc<T>, FetchError>;

type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

/// Handle to the outstanding fetch for a key.
#[must_use = "an in-flight fetch completes on its own; await `wait` to observe the result"]
pub struct InFlight<T> {
    shared: SharedFetch<T>,
    started_here: bool,
}

impl<T> InFlight<T>
where
    T: Send + Sync + 'static,
{
    /// Whether this call started the fetch, as opposed to joining one.
    pub fn started_here(&self) -> bool {
        self.started_here
    }

    /// Wait for the shared result.
    pub async fn wait(self) -> FetchResult<T> {
        self.shared.await
    }
}

/// Fetcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetcherStats {
    /// Underlying fetch attempts made.
    pub fetches_started: u64,
    /// Callers that attached to an already outstanding fetch.
    pub callers_joined: u64,
}

/// Deduplicating fetcher writing its outcomes into a [`CacheStore`].
pub struct Fetcher<T> {
    store: Arc<CacheStore<T>>,
    inflight: Arc<DashMap<CacheKey, SharedFetch<T>>>,
    started: AtomicU64,
    joined: AtomicU64,
}

impl<T> Fetcher<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(store: Arc<CacheStore<T>>) -> Self {
        Self { store, inflight: Arc::new(DashMap::new()), started: AtomicU64::new(0), joined: AtomicU64::new(0) }
    }

    /// Whether a fetch is outstanding for `key`.
    pub fn is_inflight(&self, key: &CacheKey) -> bool {
        self.inflight.contains_key(key)
    }

    /// Attach to the outstanding fetch for `key`, or start one with `fetch`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach<F, Fut>(&self, key: &CacheKey, fetch: F) -> InFlight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let Ok(registration) = self.register(key, || Ok::<(), Infallible>(()));
        match registration {
            Registration::Joined(shared) => InFlight { shared, started_here: false },
            Registration::Started(shared, tx) => {
                self.start(key, fetch(), tx);
                InFlight { shared, started_here: true }
            }
        }
    }

    /// Like [`attach`](Self::attach), but only starts a new fetch if `admit`
    /// returns true. `admit` is evaluated while no fetch is outstanding for
    /// `key`, atomically with respect to other attach calls on it.
    ///
    /// Returns `None` if nothing was outstanding and `admit` refused.
    pub fn attach_if<F, Fut, A>(&self, key: &CacheKey, fetch: F, admit: A) -> Option<InFlight<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
        A: FnOnce() -> bool,
    {
        match self.register(key, || if admit() { Ok(()) } else { Err(Refused) }) {
            Ok(Registration::Joined(shared)) => Some(InFlight { shared, started_here: false }),
            Ok(Registration::Started(shared, tx)) => {
                self.start(key, fetch(), tx);
                Some(InFlight { shared, started_here: true })
            }
            Err(Refused) => None,
        }
    }

    /// Attach to the outstanding fetch for `key`, if any.
    pub fn join(&self, key: &CacheKey) -> Option<InFlight<T>> {
        let shared = self.inflight.get(key)?.value().clone();
        self.joined.fetch_add(1, Ordering::Relaxed);
        Some(InFlight { shared, started_here: false })
    }

    /// Attach then wait for the result.
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> FetchResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.attach(key, fetch).wait().await
    }

    pub fn stats(&self) -> FetcherStats {
        FetcherStats {
            fetches_started: self.started.load(Ordering::Relaxed),
            callers_joined: self.joined.load(Ordering::Relaxed),
        }
    }

    fn register<A, R>(&self, key: &CacheKey, admit: A) -> Result<Registration<T>, R>
    where
        A: FnOnce() -> Result<(), R>,
    {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(outstanding) => {
                self.joined.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = key.short(), "joining outstanding fetch");
                Ok(Registration::Joined(outstanding.get().clone()))
            }
            Entry::Vacant(slot) => {
                admit()?;
                let (tx, rx) = oneshot::channel();
                let shared = async move {
                    rx.await.unwrap_or_else(|_| Err(FetchError::new("fetch task was cancelled")))
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                self.started.fetch_add(1, Ordering::Relaxed);
                Ok(Registration::Started(shared, tx))
            }
        }
    }

    fn start<Fut>(&self, key: &CacheKey, fetch: Fut, tx: oneshot::Sender<FetchResult<T>>)
    where
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        // Recorded after the in-flight record exists and before the task can
        // complete, so the completion mutation always follows this one.
        self.store.set(key, Mutation::Started { at: Instant::now() });
        tracing::info!(key = key.short(), "fetch started");

        let store = Arc::clone(&self.store);
        let inflight = Arc::clone(&self.inflight);
        let key = key.clone();

        tokio::spawn(async move {
            let result = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(result) => result.map(Arc::new),
                Err(panic) => Err(FetchError::new(format!("fetch panicked: {}", panic_message(&*panic)))),
            };

            match &result {
                Ok(data) => {
                    store.set(&key, Mutation::Succeeded { data: Arc::clone(data) });
                    tracing::info!(key = key.short(), "fetch succeeded");
                }
                Err(error) => {
                    tracing::warn!(key = key.short(), %error, "fetch failed");
                    store.set(&key, Mutation::Failed { error: error.clone() });
                }
            }

            inflight.remove(&key);
            // Nobody waiting is fine: the cache already holds the outcome.
            let _ = tx.send(result);
        });
    }
}

enum Registration<T> {
    Joined(SharedFetch<T>),
    Started(SharedFetch<T>, oneshot::Sender<FetchResult<T>>),
}

/// Admission denied by an `attach_if` gate.
struct Refused;

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
