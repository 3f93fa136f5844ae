//! Request-identity cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::Error;

/// Opaque identity of one fetch target.
///
/// A hex-encoded SHA-256 over the normalized request descriptor, so two
/// logically identical requests share a key and different requests do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a request descriptor.
    ///
    /// `url` is expected to be canonical already; see the client's
    /// `canonicalize`.
    pub fn from_request(method: &str, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept a previously computed key.
    pub fn parse(hash: &str) -> Result<Self, Error> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(Error::InvalidKey(hash.to_string()));
        }
        Ok(Self(hash.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = CacheKey::from_request("GET", "https://api.coincap.io/v2/assets?limit=5");
        let key2 = CacheKey::from_request("get", "https://api.coincap.io/v2/assets?limit=5");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_url() {
        let key1 = CacheKey::from_request("GET", "https://api.coincap.io/v2/assets?limit=5");
        let key2 = CacheKey::from_request("GET", "https://api.coincap.io/v2/assets?limit=10");
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_key_different_method() {
        let key1 = CacheKey::from_request("GET", "https://example.com/");
        let key2 = CacheKey::from_request("POST", "https://example.com/");
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::from_request("GET", "https://example.com/");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.short().len(), 12);
    }

    #[test]
    fn test_parse_roundtrip_and_rejects() {
        let key = CacheKey::from_request("GET", "https://example.com/");
        assert_eq!(CacheKey::parse(key.as_str()).unwrap(), key);
        assert!(matches!(CacheKey::parse("not-a-hash"), Err(Error::InvalidKey(_))));
        assert!(CacheKey::parse(&key.as_str().to_uppercase()).is_err());
    }
}
