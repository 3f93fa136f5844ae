//! Terminal rendering of the quote table.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use pricewatch_core::view::{PriceChange, filter, format_currency};
use pricewatch_core::{Asset, CacheEntry, Revalidation};

type Quotes = Vec<Asset>;

/// View-side state that outlives a single render.
#[derive(Debug, Default)]
pub struct View {
    search: String,
    last_data: Option<Arc<Quotes>>,
    last_updated: Option<DateTime<Local>>,
}

impl View {
    pub fn new(search: impl Into<String>) -> Self {
        Self { search: search.into(), ..Default::default() }
    }

    /// Record `entry`, stamping the time whenever new data arrives.
    pub fn observe(&mut self, entry: &CacheEntry<Quotes>, now: DateTime<Local>) {
        let Some(data) = &entry.data else { return };
        if self.last_data.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, data)) {
            return;
        }
        self.last_data = Some(Arc::clone(data));
        self.last_updated = Some(now);
    }

    pub fn screen<'a>(&'a self, entry: Option<&'a CacheEntry<Quotes>>) -> Screen<'a> {
        Screen { view: self, entry }
    }
}

/// One frame, ready to print.
pub struct Screen<'a> {
    view: &'a View,
    entry: Option<&'a CacheEntry<Quotes>>,
}

impl fmt::Display for Screen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Crypto Prices")?;
        if !self.view.search.trim().is_empty() {
            writeln!(f, "Search: {}", self.view.search)?;
        }
        writeln!(f)?;

        let Some(entry) = self.entry.filter(|e| !e.is_loading()) else {
            return writeln!(f, "Loading...");
        };

        if entry.error.is_some() {
            writeln!(f, "Failed to fetch data. Press Enter to retry.")?;
        }
        let Some(data) = &entry.data else {
            return writeln!(f, "{}", last_updated_line(self.view.last_updated));
        };

        let rows = filter(data.as_slice(), &self.view.search);
        if rows.is_empty() {
            writeln!(f, "No cryptocurrencies found")?;
        } else {
            writeln!(f, "{:<28} {:>16} {:>10}", "Coin", "Price", "24h")?;
            for asset in rows {
                let coin = format!("[{}] {} {}", initial(&asset.symbol), asset.name, asset.symbol);
                let change = PriceChange::parse(&asset.change_percent24_hr);
                writeln!(f, "{:<28} {:>16} {:>10}", coin, format_currency(&asset.price_usd), change)?;
            }
        }

        writeln!(f)?;
        if entry.is_validating {
            writeln!(f, "Refreshing...")?;
        }
        writeln!(f, "{}", last_updated_line(self.view.last_updated))
    }
}

/// Feedback for a manual refresh that did not start a fetch.
pub fn refresh_status(outcome: &Revalidation<Quotes>) -> Option<&'static str> {
    match outcome {
        Revalidation::Deduped(_) => Some("Prices were fetched moments ago; refresh skipped."),
        Revalidation::Joined(_) => Some("A refresh is already in progress."),
        Revalidation::Started(_) | Revalidation::Ignored => None,
    }
}

fn initial(symbol: &str) -> char {
    symbol.chars().next().unwrap_or('?')
}

fn last_updated_line(at: Option<DateTime<Local>>) -> String {
    match at {
        Some(at) => format!("Last updated on {}", at.format("%B %-d, %Y %-I:%M %p")),
        None => "Not yet updated".to_string(),
    }
}
