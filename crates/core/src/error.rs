//! Unified error types for pricewatch.
//!
//! `FetchError` is the single failure signal stored in a cache entry. Transport,
//! status and decode failures all collapse into it before they reach the cache.

use crate::config::ConfigError;

/// Failure of one fetch attempt, as seen by the cache and every subscriber.
///
/// Cheap to clone: all callers coalesced onto one fetch receive the same value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    /// Create a fetch error carrying a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Unified error types for pricewatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The fetch backing a cache key failed.
    #[error("FETCH_FAILED: {0}")]
    Fetch(#[from] FetchError),

    /// A cache key was not a well-formed digest.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// Configuration could not be loaded or failed validation.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}
