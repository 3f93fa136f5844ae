//! Client-side search over name and symbol.

use crate::Asset;

/// Anything that can be searched by name or symbol.
pub trait Listing {
    fn name(&self) -> &str;
    fn symbol(&self) -> &str;
}

impl Listing for Asset {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Whether `item` matches `search`, case-insensitively on name or symbol.
///
/// A blank search matches everything. Otherwise the search is used as typed,
/// surrounding whitespace included.
pub fn matches<L: Listing>(item: &L, search: &str) -> bool {
    if search.trim().is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    item.name().to_lowercase().contains(&needle) || item.symbol().to_lowercase().contains(&needle)
}

/// Items matching `search`, in source order.
pub fn filter<'a, L: Listing>(items: &'a [L], search: &str) -> Vec<&'a L> {
    items.iter().filter(|item| matches(*item, search)).collect()
}
