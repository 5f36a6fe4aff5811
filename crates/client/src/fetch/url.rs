//! URL canonicalization, cache busting and origin trust.

/// Query parameter appended to install-time fetches to bypass upstream caches.
pub const CACHE_BUST_PARAM: &str = "_sw-cache";

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string for consistent caching and safety checks.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
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

    if let Some(mut host) = parsed.host_str() {
        let h = host.to_lowercase();
        host = h.as_str();
        parsed
            .set_host(Some(host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Append a cache-busting parameter, keeping any existing query.
pub fn cache_bust(url: &url::Url, stamp: i64) -> url::Url {
    let mut busted = url.clone();
    busted.query_pairs_mut().append_pair(CACHE_BUST_PARAM, &stamp.to_string());
    busted
}

/// Origins whose responses may be intercepted and cached.
#[derive(Debug, Clone)]
pub struct OriginSet {
    app: url::Origin,
    assets: Vec<url::Origin>,
}

impl OriginSet {
    pub fn new(app: &url::Url, assets: &[url::Url]) -> Self {
        Self { app: app.origin(), assets: assets.iter().map(url::Url::origin).collect() }
    }

    /// Build from configured strings; unparsable asset origins are skipped.
    pub fn parse(app: &str, assets: &[String]) -> Result<Self, UrlError> {
        let app = canonicalize(app)?;
        let assets: Vec<url::Url> = assets
            .iter()
            .filter_map(|origin| match canonicalize(origin) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(origin = %origin, error = %e, "ignoring invalid asset origin");
                    None
                }
            })
            .collect();
        Ok(Self::new(&app, &assets))
    }

    /// Application origin or an allow-listed asset origin.
    pub fn is_trusted(&self, url: &url::Url) -> bool {
        let origin = url.origin();
        origin == self.app || self.assets.contains(&origin)
    }
}
