//! Core types and the stale-while-revalidate engine for pricewatch.
//!
//! This crate provides:
//! - In-memory cache store with per-key subscriptions
//! - Deduplicating fetcher and revalidation gating
//! - Filtering and formatting for the quote view
//! - Unified error types and layered configuration

pub mod asset;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod revalidate;
pub mod swr;
pub mod view;

pub use asset::{Asset, AssetsResponse};
pub use cache::{CacheEntry, CacheKey, CacheStats, CacheStore, Mutation, Subscription};
pub use config::{AppConfig, ConfigError, StoreOptions, SwrOptions};
pub use error::{Error, FetchError};
pub use fetcher::{FetchResult, Fetcher, FetcherStats, InFlight};
pub use revalidate::{Decision, KeyState, RevalidationController, Stimulus};
pub use swr::{Binding, FetchFn, Revalidation, Swr, SwrStats};
