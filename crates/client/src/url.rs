//! URL canonicalization for stable cache keys.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an endpoint so equivalent spellings share one cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Sort query pairs by name, keeping the order of repeated names
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        if pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(pairs.iter());
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://api.coincap.io/v2/assets").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("api.coincap.io"));
        assert_eq!(url.path(), "/v2/assets");
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("api.coincap.io/v2/assets").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://API.CoinCap.IO/v2/assets").unwrap();
        assert_eq!(url.host_str(), Some("api.coincap.io"));
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://api.coincap.io/v2/assets?limit=5#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("limit=5"));
    }

    #[test]
    fn test_canonicalize_sorts_query() {
        let a = canonicalize("https://api.coincap.io/v2/assets?limit=5&offset=0").unwrap();
        let b = canonicalize("https://api.coincap.io/v2/assets?offset=0&limit=5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.query(), Some("limit=5&offset=0"));
    }

    #[test]
    fn test_canonicalize_repeated_names_keep_order() {
        let url = canonicalize("https://example.com/?ids=eth&a=1&ids=btc").unwrap();
        assert_eq!(url.query(), Some("a=1&ids=eth&ids=btc"));
    }

    #[test]
    fn test_canonicalize_empty_query_dropped() {
        let url = canonicalize("https://example.com/?").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        assert!(matches!(canonicalize("ftp://example.com/assets"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert_eq!(canonicalize(""), Err(UrlError::Empty));
        assert_eq!(canonicalize("   "), Err(UrlError::Empty));
    }

    #[test]
    fn test_canonicalize_invalid() {
        assert!(matches!(canonicalize("https://"), Err(UrlError::InvalidUrl(_))));
    }
}
