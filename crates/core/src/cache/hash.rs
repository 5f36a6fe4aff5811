//! Request identity keys.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::Request;

/// Normalized identity of a request inside a tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Hex SHA-256 of method and canonical URL.
    pub hash: String,
    pub method: String,
    /// Canonical URL (fragment removed).
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut canonical = url.clone();
        canonical.set_fragment(None);
        let method = method.to_ascii_uppercase();
        let hash = compute_request_key(&method, canonical.as_str());
        Self { hash, method, url: canonical.into() }
    }

    /// Key of a `GET` for `url`, as used by prefetching and fallbacks.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn for_request(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }
}

/// Compute the storage key for a method and canonical URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
