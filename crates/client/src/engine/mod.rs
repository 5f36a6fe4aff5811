//! Request-interception caching engine.
//!
//! The [`Engine`] owns the tier registry and the network collaborator and
//! exposes the three lifecycle hooks of the host as plain async methods:
//!
//! - [`Engine::on_install`] caches the core assets and readies activation
//! - [`Engine::on_activate`] deletes superseded tiers, starts claiming
//!   requests and caches secondary assets in the background
//! - [`Engine::on_intercept`] routes one request through the strategy
//!   selector, the matching executor and, on total failure, the fallback
//!   synthesizer
//!
//! Background work (secondary prefetch, revalidation writes) is tracked and
//! can be awaited with [`Engine::settle`].

pub mod fallback;
pub mod gc;
pub mod prefetch;
pub mod selector;
mod strategies;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::Serialize;
use swtier_core::cache::RequestKey;
use swtier_core::{AppConfig, CacheStorage, Error, Request, Response, TierHandle, TierNames, TierPurpose, TierRegistry};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{FetchRequest, Network, OriginSet};
pub use fallback::Fallback;
pub use gc::GcReport;
pub use prefetch::{PrefetchFailure, PrefetchReport, ResourceDescriptor};
pub use selector::{Strategy, StrategyDecision};

/// Lifecycle phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsed,
    Installed,
    Active,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parsed => "parsed",
            Phase::Installed => "installed",
            Phase::Active => "active",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Installed,
            2 => Phase::Active,
            _ => Phase::Parsed,
        }
    }
}

/// Tagged result of a strategy.
#[derive(Debug)]
pub enum Outcome {
    Network(Response),
    Cache(Response),
    Fallback(Response),
    Failed(Error),
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Network(r) | Outcome::Cache(r) | Outcome::Fallback(r) => Some(r),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Response, Error> {
        match self {
            Outcome::Network(r) | Outcome::Cache(r) | Outcome::Fallback(r) => Ok(r),
            Outcome::Failed(e) => Err(e),
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Outcome::Network(_) => "network",
            Outcome::Cache(_) => "cache",
            Outcome::Fallback(_) => "fallback",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Result of delivering a request to the engine.
#[derive(Debug)]
pub enum Interception {
    /// The engine declined; the host lets the request go to the network untouched.
    Passthrough,
    Handled { decision: StrategyDecision, outcome: Outcome },
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub tier: String,
    pub core: PrefetchReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub gc: GcReport,
    pub secondary_scheduled: usize,
}

/// Fetch bounded by `timeout`; expiry is [`Error::FetchTimeout`].
pub(crate) async fn timed_fetch(
    network: &dyn Network, request: &FetchRequest, timeout: Duration,
) -> Result<Response, Error> {
    match tokio::time::timeout(timeout, network.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::FetchTimeout(format!("{} after {}ms", request.url, timeout.as_millis()))),
    }
}

pub struct Engine {
    config: AppConfig,
    origins: OriginSet,
    tiers: TierNames,
    registry: TierRegistry,
    network: Arc<dyn Network>,
    timeout: Duration,
    phase: AtomicU8,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(config: AppConfig, network: Arc<dyn Network>, storage: Arc<dyn CacheStorage>) -> Result<Self, Error> {
        let origins =
            OriginSet::parse(&config.origin, &config.asset_origins).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origins,
            tiers: config.tier_names(),
            registry: TierRegistry::new(storage),
            network,
            timeout: config.timeout(),
            phase: AtomicU8::new(Phase::Parsed as u8),
            background: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn tier_names(&self) -> &TierNames {
        &self.tiers
    }

    pub fn registry(&self) -> &TierRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Prefetch lists resolved against the trusted origin.
    ///
    /// Each resource targets the tier a later `GET` of it is served from.
    pub fn resources(&self) -> Result<Vec<ResourceDescriptor>, Error> {
        let core = self.config.core_assets.iter().map(|asset| (asset, true));
        let secondary = self.config.secondary_assets.iter().map(|asset| (asset, false));
        core.chain(secondary)
            .map(|(asset, is_core)| {
                let url = self.resolve(asset)?;
                let tier = self.decide(&Request::get(url.clone())).tier;
                Ok(ResourceDescriptor { url, is_core, tier })
            })
            .collect()
    }

    fn resolve(&self, path_or_url: &str) -> Result<Url, Error> {
        self.config.resolve(path_or_url).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Handle for a current tier.
    pub(crate) fn tier(&self, purpose: TierPurpose) -> TierHandle {
        self.registry.handle(self.tiers.name(purpose))
    }

    /// Install: open the static tier and cache the core assets into their
    /// serving tiers.
    ///
    /// Individual asset failures are reported, not returned. The engine is
    /// ready to activate as soon as this returns.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        tracing::info!(version = %self.config.cache_version, "installing");
        let tier = self.registry.open(self.tiers.name(TierPurpose::Static)).await?;
        let core: Vec<_> = self.resources()?.into_iter().filter(|r| r.is_core).collect();

        let report =
            prefetch::prefetch_core(self.network.as_ref(), &self.registry, &self.tiers, &core, self.timeout).await;
        if !report.failed.is_empty() {
            tracing::warn!(failed = report.failed.len(), cached = report.cached.len(), "some core assets were not cached");
        }

        self.set_phase(Phase::Installed);
        Ok(InstallReport { tier: tier.name().to_string(), core: report })
    }

    /// Activate: retire superseded tiers, then claim requests.
    ///
    /// Secondary assets are cached in the background and do not delay
    /// activation.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        if self.phase() == Phase::Parsed {
            return Err(Error::InvalidInput("activate called before install".into()));
        }
        tracing::info!("activating");

        let gc = gc::collect_stale_tiers(&self.registry, &self.tiers).await;
        for name in self.tiers.iter() {
            if let Err(e) = self.registry.open(name).await {
                tracing::warn!(tier = name, error = %e, "could not open current tier");
            }
        }

        self.set_phase(Phase::Active);
        tracing::info!(deleted = gc.deleted.len(), "active and controlling");

        let secondary: Vec<_> = self.resources()?.into_iter().filter(|r| !r.is_core).collect();
        let secondary_scheduled = secondary.len();
        if !secondary.is_empty() {
            let task = tokio::spawn(prefetch::prefetch_secondary(
                Arc::clone(&self.network),
                self.registry.clone(),
                self.tiers.clone(),
                secondary,
                self.timeout,
            ));
            self.track(task).await;
        }

        Ok(ActivateReport { gc, secondary_scheduled })
    }

    /// Selector decision for a request.
    pub fn decide(&self, request: &Request) -> StrategyDecision {
        selector::select(&self.config.routing, request)
    }

    /// Deliver one intercepted request.
    ///
    /// Requests before activation and requests to untrusted origins pass
    /// through untouched.
    pub async fn on_intercept(&self, request: &Request) -> Interception {
        if self.phase() != Phase::Active || !self.origins.is_trusted(&request.url) {
            return Interception::Passthrough;
        }

        let decision = self.decide(request);
        let tier = self.tier(decision.tier);
        tracing::debug!(
            url = %request.url,
            method = %request.method,
            strategy = decision.strategy.as_str(),
            tier = tier.name(),
            "intercepted"
        );

        let outcome = match decision.strategy {
            Strategy::CacheFirst => self.cache_first(request, &tier).await,
            Strategy::NetworkFirst => self.network_first(request, &tier).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &tier).await,
        };

        if let Outcome::Failed(e) = &outcome {
            tracing::warn!(url = %request.url, error = %e, "no response available");
        }
        Interception::Handled { decision, outcome }
    }

    /// Wait for every background task registered so far, including tasks
    /// spawned while waiting.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.background.lock().await);
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "background task failed");
                }
            }
        }
    }

    async fn track(&self, task: JoinHandle<()>) {
        let mut background = self.background.lock().await;
        background.retain(|t| !t.is_finished());
        background.push(task);
    }

    pub(crate) async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        timed_fetch(self.network.as_ref(), &FetchRequest::from_request(request), self.timeout).await
    }

    /// Tier lookup; storage failures count as a miss.
    pub(crate) async fn lookup(&self, tier: &TierHandle, key: &RequestKey) -> Option<Response> {
        match tier.lookup(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(tier = tier.name(), url = %key.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Store a successful `GET` response; storage failures are logged.
    pub(crate) async fn store(&self, tier: &TierHandle, request: &Request, key: &RequestKey, response: &Response) {
        if !request.is_get() || !response.is_success() {
            return;
        }
        if let Err(e) = tier.put(key, response).await {
            tracing::warn!(tier = tier.name(), url = %key.url, error = %e, "cache write failed");
        }
    }

    /// Network-first substitute for a failed request, or `error`.
    ///
    /// Only navigations, JSON, styles and scripts are substituted. The image
    /// placeholder belongs to cache-first; here an image failure propagates.
    pub(crate) async fn network_fallback(&self, request: &Request, error: Error) -> Outcome {
        match fallback::for_request(request) {
            Fallback::OfflinePage => match self.offline_page().await {
                Some(page) => Outcome::Fallback(page),
                None => Outcome::Failed(error),
            },
            Fallback::Synthesized(response) => Outcome::Fallback(response),
            Fallback::Placeholder | Fallback::None => Outcome::Failed(error),
        }
    }

    async fn offline_page(&self) -> Option<Response> {
        let url = self.resolve(&self.config.offline_page).ok()?;
        self.registry.match_any(self.tiers.iter(), &RequestKey::get(&url)).await
    }

    /// Cached placeholder image, else the embedded transparent PNG.
    pub(crate) async fn image_placeholder(&self, request: &Request) -> Response {
        if let Ok(url) = self.resolve(&self.config.offline_placeholder) {
            let tiers = [self.tiers.name(TierPurpose::Image), self.tiers.name(TierPurpose::Static)];
            if let Some(placeholder) = self.registry.match_any(tiers, &RequestKey::get(&url)).await {
                return placeholder;
            }
        }
        fallback::transparent_png(request.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedNetwork, engine_with, response, test_config, url};
    use super::*;
    use swtier_core::{CacheDb, Destination};

    #[tokio::test]
    async fn test_intercept_before_activation_passes_through() {
        let (engine, _network) = engine_with(test_config()).await;
        assert_eq!(engine.phase(), Phase::Parsed);
        assert!(matches!(engine.on_intercept(&Request::get(url("/dashboard"))).await, Interception::Passthrough));

        engine.on_install().await.unwrap();
        assert_eq!(engine.phase(), Phase::Installed);
        assert!(matches!(engine.on_intercept(&Request::get(url("/dashboard"))).await, Interception::Passthrough));
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let (engine, _network) = engine_with(test_config()).await;
        assert!(matches!(engine.on_activate().await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_untrusted_origin_passes_through() {
        let (engine, network) = engine_with(test_config()).await;
        engine.on_install().await.unwrap();
        engine.on_activate().await.unwrap();

        let request = Request::get(Url::parse("https://tracker.example.com/pixel.js").unwrap());
        assert!(matches!(engine.on_intercept(&request).await, Interception::Passthrough));
        assert!(network.calls().iter().all(|c| c.url.host_str() != Some("tracker.example.com")));
    }

    #[tokio::test]
    async fn test_install_caches_core_assets() {
        let (engine, network) = engine_with(test_config()).await;
        network.respond("http://localhost:5000/", response("", 200, "home"));
        network.respond("http://localhost:5000/offline", response("", 200, "offline"));

        let report = engine.on_install().await.unwrap();
        assert_eq!(report.tier, "static-v2");
        assert_eq!(report.core.cached.len(), 2);
        assert!(report.core.failed.is_empty());

        let tier = engine.tier(TierPurpose::Static);
        assert_eq!(tier.urls().await.unwrap(), vec!["http://localhost:5000/", "http://localhost:5000/offline"]);
    }

    #[tokio::test]
    async fn test_install_twice_is_idempotent() {
        let (engine, network) = engine_with(test_config()).await;
        network.respond("http://localhost:5000/", response("", 200, "home"));
        network.respond("http://localhost:5000/offline", response("", 200, "offline"));
        let tier = engine.tier(TierPurpose::Static);

        engine.on_install().await.unwrap();
        let first_urls = tier.urls().await.unwrap();
        let key = RequestKey::get(&url("/offline"));
        let first = tier.lookup(&key).await.unwrap().unwrap();

        engine.on_install().await.unwrap();
        assert_eq!(tier.urls().await.unwrap(), first_urls);
        let second = tier.lookup(&key).await.unwrap().unwrap();
        assert_eq!((second.status, second.body), (first.status, first.body));
        assert_eq!(engine.registry().keys().await.unwrap(), vec!["static-v2"]);
    }

    #[tokio::test]
    async fn test_install_survives_core_failures() {
        let (engine, network) = engine_with(test_config()).await;
        network.respond("http://localhost:5000/offline", response("", 200, "offline"));
        network.fail("http://localhost:5000/");

        let report = engine.on_install().await.unwrap();
        assert_eq!(report.core.cached, vec!["http://localhost:5000/offline"]);
        assert_eq!(report.core.failed.len(), 1);
        assert_eq!(engine.phase(), Phase::Installed);
    }

    #[tokio::test]
    async fn test_activation_cutover() {
        let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let legacy = TierRegistry::new(storage.clone());
        let key = RequestKey::get(&url("/"));
        legacy.open("static-v1").await.unwrap().put(&key, &response(&key.url, 200, "v1")).await.unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        let engine = Engine::new(test_config(), network, storage).unwrap();
        engine.on_install().await.unwrap();
        let report = engine.on_activate().await.unwrap();

        assert_eq!(report.gc.deleted, vec!["static-v1"]);
        assert_eq!(engine.phase(), Phase::Active);
        assert_eq!(engine.registry().keys().await.unwrap(), vec!["api-v2", "image-v2", "static-v2"]);
    }

    #[tokio::test]
    async fn test_secondary_assets_cached_in_background() {
        let config = AppConfig { secondary_assets: vec!["/login".into(), "/register".into()], ..test_config() };
        let (engine, network) = engine_with(config).await;
        network.respond("http://localhost:5000/login", response("", 200, "login"));

        engine.on_install().await.unwrap();
        let report = engine.on_activate().await.unwrap();
        assert_eq!(report.secondary_scheduled, 2);

        engine.settle().await;
        let urls = engine.tier(TierPurpose::Static).urls().await.unwrap();
        assert!(urls.contains(&"http://localhost:5000/login".to_string()));
        assert!(!urls.contains(&"http://localhost:5000/register".to_string()));
    }

    async fn served(engine: &Engine, request: Request) -> Outcome {
        match engine.on_intercept(&request).await {
            Interception::Handled { outcome, .. } => outcome,
            Interception::Passthrough => panic!("request was not handled: {}", request.url),
        }
    }

    #[tokio::test]
    async fn test_installed_icon_served_offline() {
        let config = AppConfig {
            core_assets: vec!["/".into(), "/offline".into(), "/static/images/icon-192x192.png".into()],
            ..test_config()
        };
        let (engine, network) = engine_with(config).await;
        network.respond("http://localhost:5000/", response("", 200, "home"));
        network.respond("http://localhost:5000/offline", response("", 200, "offline"));
        network.respond("http://localhost:5000/static/images/icon-192x192.png", response("", 200, "ICON"));
        engine.on_install().await.unwrap();
        engine.on_activate().await.unwrap();
        network.fail_all();

        let icon = Request::get(url("/static/images/icon-192x192.png")).with_destination(Destination::Image);
        let outcome = served(&engine, icon).await;
        assert!(matches!(&outcome, Outcome::Cache(r) if r.body.as_ref() == b"ICON"), "{outcome:?}");
    }

    #[tokio::test]
    async fn test_default_core_assets_served_offline() {
        let config = AppConfig { cache_prefix: String::new(), secondary_assets: vec![], ..AppConfig::default() };
        let (engine, network) = engine_with(config).await;
        let tailwind = "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css";
        let assets = [
            ("http://localhost:5000/", "home"),
            ("http://localhost:5000/offline", "offline"),
            ("http://localhost:5000/static/manifest.json", "{}"),
            ("http://localhost:5000/static/js/register-sw.js", "register"),
            ("http://localhost:5000/static/images/icon-192x192.png", "ICON"),
            (tailwind, "tailwind"),
        ];
        for (asset, body) in assets {
            network.respond(asset, response("", 200, body));
        }

        let report = engine.on_install().await.unwrap();
        assert!(report.core.failed.is_empty(), "{:?}", report.core.failed);
        engine.on_activate().await.unwrap();
        network.fail_all();

        let page = served(&engine, Request::navigation(url("/"))).await;
        assert!(matches!(&page, Outcome::Cache(r) if r.body.as_ref() == b"home"), "{page:?}");

        let style = Request::get(Url::parse(tailwind).unwrap()).with_destination(Destination::Style);
        let style = served(&engine, style).await;
        assert!(matches!(&style, Outcome::Cache(r) if r.body.as_ref() == b"tailwind"), "{style:?}");

        let icon = Request::get(url("/static/images/icon-192x192.png")).with_destination(Destination::Image);
        let icon = served(&engine, icon).await;
        assert!(matches!(&icon, Outcome::Cache(r) if r.body.as_ref() == b"ICON"), "{icon:?}");

        let script = Request::get(url("/static/js/register-sw.js")).with_destination(Destination::Script);
        assert_eq!(served(&engine, script).await.source(), "cache");
        assert_eq!(served(&engine, Request::get(url("/static/manifest.json"))).await.source(), "cache");

        engine.settle().await;
    }

    #[tokio::test]
    async fn test_resources_resolved_against_origin() {
        let (engine, _network) = engine_with(AppConfig::default()).await;
        let resources = engine.resources().unwrap();
        assert_eq!(resources.iter().filter(|r| r.is_core).count(), 6);
        assert!(resources.iter().any(|r| r.url.as_str() == "http://localhost:5000/offline" && r.is_core));
        assert!(resources.iter().any(|r| r.url.host_str() == Some("cdnjs.cloudflare.com") && !r.is_core));

        let icon = resources.iter().find(|r| r.url.path() == "/static/images/icon-192x192.png").unwrap();
        assert_eq!(icon.tier, TierPurpose::Image);
        let others = resources.iter().filter(|r| r.is_core && r.url != icon.url);
        assert!(others.into_iter().all(|r| r.tier == TierPurpose::Static));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let network = Arc::new(ScriptedNetwork::new());
        network.hang("http://localhost:5000/slow");
        let request = FetchRequest::get(url("/slow"));

        let result = timed_fetch(network.as_ref(), &request, Duration::from_millis(250)).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = Outcome::Cache(response("http://localhost:5000/", 200, "x"));
        assert_eq!(outcome.source(), "cache");
        assert!(outcome.response().is_some());
        let failed = Outcome::Failed(Error::Network("down".into()));
        assert!(failed.response().is_none());
        assert!(failed.into_result().is_err());
    }
}
