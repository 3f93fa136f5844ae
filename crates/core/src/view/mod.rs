//! Projection of cached quotes into displayable rows.
//!
//! Pure functions only: the view owns the search string, the cache owns the
//! data, and everything here is recomputed from both on every render.

pub mod filter;
pub mod format;

pub use filter::{Listing, filter, matches};
pub use format::{Direction, PriceChange, format_currency, parse_number};
