//! Per-key cache entries and the mutations applied to them.

use std::sync::Arc;

use tokio::time::Instant;

use crate::FetchError;

/// Latest known state of one cache key.
///
/// While `is_validating` is true, `data` and `error` still describe the
/// previous completed fetch.
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// Last successfully fetched payload.
    pub data: Option<Arc<T>>,
    /// Last fetch failure, cleared by the next success.
    pub error: Option<FetchError>,
    /// Start time of the most recently initiated fetch.
    pub last_fetch_started_at: Option<Instant>,
    /// True strictly between fetch initiation and its completion.
    pub is_validating: bool,
}

// Manual impls: `T` itself does not need to be `Clone` or `Default`.
impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetch_started_at: self.last_fetch_started_at,
            is_validating: self.is_validating,
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self { data: None, error: None, last_fetch_started_at: None, is_validating: false }
    }
}

impl<T> CacheEntry<T> {
    /// Validating with no data to show yet, whether or not a previous
    /// attempt failed.
    pub fn is_loading(&self) -> bool {
        self.is_validating && self.data.is_none()
    }

    /// Apply a mutation in place.
    pub(crate) fn apply(&mut self, mutation: Mutation<T>) {
        match mutation {
            Mutation::Started { at } => {
                self.last_fetch_started_at = Some(match self.last_fetch_started_at {
                    Some(prev) if prev > at => prev,
                    _ => at,
                });
                self.is_validating = true;
            }
            Mutation::Succeeded { data } => {
                self.data = Some(data);
                self.error = None;
                self.is_validating = false;
            }
            Mutation::Failed { error } => {
                self.error = Some(error);
                self.is_validating = false;
            }
        }
    }
}

/// Partial update of a cache entry.
#[derive(Debug)]
pub enum Mutation<T> {
    /// A fetch was initiated.
    Started { at: Instant },
    /// The fetch completed with a payload; clears any previous error.
    Succeeded { data: Arc<T> },
    /// The fetch failed; previous data is kept.
    Failed { error: FetchError },
}
