//! In-memory stale-while-revalidate cache.
//!
//! This module provides the process-local cache store shared by every
//! binding of an engine instance. It supports:
//!
//! - Request-identity keys using SHA-256 hashing
//! - Partial, atomic entry mutations with synchronous subscriber notification
//! - Stale data surviving failed revalidation
//! - Optional size bound evicting idle keys, oldest fetch first

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{CacheEntry, Mutation};
pub use key::CacheKey;
pub use store::{CacheStats, CacheStore, Subscription};
