//! Network collaborator of the caching engine.
//!
//! ### Contract
//! - [`Network::fetch`] returns a [`Response`] for any HTTP answer, 4xx/5xx
//!   included; an `Err` means no response at all.
//! - [`FetchRequest`] carries the credential scope and the cache-control
//!   override used by install-time prefetching.
//!
//! ### Reqwest client
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)
//! - `CacheMode::NoCache` sends `Cache-Control: no-cache` and `Pragma: no-cache`
//! - The configured session cookie is attached only when the credential
//!   scope allows it for the target origin.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use self::url::{CACHE_BUST_PARAM, OriginSet, UrlError, cache_bust, canonicalize};

use swtier_core::{AppConfig, Error, Request, Response};

/// Whether an upstream cache may answer the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoCache,
}

/// When credentials accompany a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// A request as handed to the network.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: String,
    pub url: ::url::Url,
    pub accept: Option<String>,
    pub body: Option<Bytes>,
    pub cache_mode: CacheMode,
    pub credentials: Credentials,
}

impl FetchRequest {
    /// `GET` with default cache mode and same-origin credentials.
    pub fn get(url: ::url::Url) -> Self {
        Self {
            method: "GET".into(),
            url,
            accept: None,
            body: None,
            cache_mode: CacheMode::Default,
            credentials: Credentials::SameOrigin,
        }
    }

    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method.clone(),
            accept: request.accept.clone(),
            body: request.body.clone(),
            ..Self::get(request.url.clone())
        }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

/// Anything that can perform a fetch.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swtier/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin that counts as "same origin" for credentials.
    pub origin: Option<::url::Url>,

    /// Cookie header value sent with credentialed fetches.
    pub session_cookie: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swtier/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(15000),
            max_redirects: 5,
            origin: None,
            session_cookie: None,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: Some(origin),
            session_cookie: config.session_cookie.clone(),
            ..Default::default()
        })
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Cookie to attach for this request, if the credential scope allows it.
    fn credential_cookie(&self, request: &FetchRequest) -> Option<&str> {
        let cookie = self.config.session_cookie.as_deref()?;
        match request.credentials {
            Credentials::Omit => None,
            Credentials::Include => Some(cookie),
            Credentials::SameOrigin => {
                let origin = self.config.origin.as_ref()?;
                (origin.origin() == request.url.origin()).then_some(cookie)
            }
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        if request.cache_mode == CacheMode::NoCache {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if let Some(cookie) = self.credential_cookie(request) {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(request.url.to_string())
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::new(final_url, status.as_u16(), headers, bytes))
    }
}
