//! Client error types.

use std::sync::Arc;

use pricewatch_core::FetchError;

use crate::url::UrlError;

/// Errors from the quote endpoint client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Transport failure before a response arrived.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Non-success response status.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Body is not a quote response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Endpoint could not be canonicalized.
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ClientError::Timeout } else { ClientError::Network(Arc::new(err)) }
    }
}

/// Every client failure lands in the cache as the same error kind.
impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        FetchError::new(format!("Failed to fetch data: {err}"))
    }
}
