//! Client code for pricewatch.
//!
//! This crate provides the HTTP boundary of the engine: the quote endpoint
//! client, URL canonicalization for cache keys, and the glue that binds an
//! asset source to an engine instance.

pub mod assets;
pub mod error;
pub mod url;

use std::sync::Arc;

use pricewatch_core::{Asset, Binding, FetchError, Swr};

pub use assets::{AssetClient, AssetClientConfig, AssetSource};
pub use error::ClientError;
pub use url::{UrlError, canonicalize};

/// Bind `source` to `swr` under the source's cache key.
///
/// Every fetch the binding triggers calls the source once; client errors are
/// normalized to [`FetchError`] before they reach the cache.
pub fn bind_source<S>(swr: &Swr<Vec<Asset>>, source: Arc<S>) -> Binding<Vec<Asset>>
where
    S: AssetSource + 'static,
{
    let key = source.cache_key();
    swr.bind(key, move || {
        let source = Arc::clone(&source);
        async move { source.fetch_assets().await.map_err(FetchError::from) }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use pricewatch_core::{CacheKey, Revalidation, StoreOptions, SwrOptions};

    use super::*;

    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: AtomicBool::new(false) })
        }
    }

    #[async_trait::async_trait]
    impl AssetSource for FakeSource {
        async fn fetch_assets(&self) -> Result<Vec<Asset>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::HttpError { status: 503 });
            }
            Ok(vec![Asset {
                id: "bitcoin".into(),
                rank: "1".into(),
                symbol: "BTC".into(),
                name: "Bitcoin".into(),
                supply: "19700000".into(),
                max_supply: None,
                market_cap_usd: "1".into(),
                volume_usd24_hr: "1".into(),
                price_usd: "66000".into(),
                change_percent24_hr: "0.5".into(),
                vwap24_hr: None,
                explorer: None,
            }])
        }

        fn cache_key(&self) -> CacheKey {
            CacheKey::from_request("GET", "https://quotes.test/assets")
        }
    }

    #[tokio::test]
    async fn test_bind_source_populates_cache() {
        let swr = Swr::new(SwrOptions::default(), StoreOptions::default());
        let source = FakeSource::new();
        let binding = bind_source(&swr, Arc::clone(&source));

        let outcome = binding.mount().await;
        assert!(matches!(outcome, Revalidation::Started(Ok(_))));

        let entry = binding.entry().unwrap();
        assert_eq!(entry.data.as_ref().map(|d| d[0].symbol.as_str()), Some("BTC"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bindings_on_same_source_share_one_fetch() {
        let swr = Swr::new(SwrOptions::default(), StoreOptions::default());
        let source = FakeSource::new();
        let a = bind_source(&swr, Arc::clone(&source));
        let b = bind_source(&swr, Arc::clone(&source));

        let (ra, rb) = tokio::join!(a.mount(), b.mount());
        assert!(ra.fetched() && rb.fetched());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_error_is_normalized() {
        let swr = Swr::new(SwrOptions::default(), StoreOptions::default());
        let source = FakeSource::new();
        source.fail.store(true, Ordering::SeqCst);
        let binding = bind_source(&swr, Arc::clone(&source));

        binding.mount().await;
        let entry = binding.entry().unwrap();
        assert!(entry.data.is_none());
        assert_eq!(entry.error.unwrap().message(), "Failed to fetch data: HTTP error: 503");
    }

    const QUOTES: &str = r#"{"data":[{"id":"bitcoin","rank":"1","symbol":"BTC","name":"Bitcoin",
        "supply":"19700000","maxSupply":null,"marketCapUsd":"1300000000000","volumeUsd24Hr":"9000000000",
        "priceUsd":"66000.12","changePercent24Hr":"-1.23","vwap24Hr":null,"explorer":null}]}"#;

    #[tokio::test]
    async fn test_failed_refresh_over_http_keeps_stale_quotes() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/v2/assets")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(QUOTES)
            .create_async()
            .await;

        let client = AssetClient::new(AssetClientConfig {
            endpoint: format!("{}/v2/assets?limit=5", server.url()),
            ..Default::default()
        })
        .unwrap();
        let options = SwrOptions { deduping_interval: Duration::from_millis(500), ..Default::default() };
        let swr = Swr::new(options, StoreOptions::default());
        let binding = bind_source(&swr, Arc::new(client));

        assert!(matches!(binding.mount().await, Revalidation::Started(Ok(_))));
        ok.assert_async().await;
        ok.remove_async().await;

        let failing = server
            .mock("GET", "/v2/assets")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        assert!(matches!(binding.refresh().await, Revalidation::Deduped(Some(_))));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(binding.refresh().await, Revalidation::Started(Err(_))));
        failing.assert_async().await;

        let entry = binding.entry().unwrap();
        assert_eq!(entry.data.as_ref().map(|d| d[0].symbol.as_str()), Some("BTC"));
        assert_eq!(entry.error.unwrap().message(), "Failed to fetch data: HTTP error: 503");
        assert!(!entry.is_validating);
    }
}
