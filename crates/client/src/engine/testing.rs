//! Test doubles for the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use swtier_core::cache::RequestKey;
use swtier_core::{AppConfig, CacheDb, CacheStorage, Error, Response};
use tokio::sync::Notify;
use url::Url;

use super::Engine;
use crate::fetch::{FetchRequest, Network};

pub(crate) fn url(path: &str) -> Url {
    Url::parse(&format!("http://localhost:5000{path}")).unwrap()
}

/// A `text/plain` response; an empty `url` is filled in from the request.
pub(crate) fn response(url: &str, status: u16, body: &str) -> Response {
    Response::new(url, status, vec![("Content-Type".into(), "text/plain".into())], body.to_string())
}

/// Two core assets, no secondary assets, unprefixed tier names.
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        cache_prefix: String::new(),
        core_assets: vec!["/".into(), "/offline".into()],
        secondary_assets: vec![],
        ..AppConfig::default()
    }
}

pub(crate) async fn engine_with(config: AppConfig) -> (Engine, Arc<ScriptedNetwork>) {
    let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let network = Arc::new(ScriptedNetwork::new());
    let engine = Engine::new(config, network.clone(), storage).unwrap();
    (engine, network)
}

/// Installed and activated engine whose core assets were served.
pub(crate) async fn activated(config: AppConfig) -> (Engine, Arc<ScriptedNetwork>) {
    let (engine, network) = engine_with(config).await;
    network.respond("http://localhost:5000/", response("", 200, "home"));
    network.respond("http://localhost:5000/offline", response("", 200, "offline"));
    engine.on_install().await.unwrap();
    engine.on_activate().await.unwrap();
    engine.settle().await;
    (engine, network)
}

#[derive(Clone)]
enum Route {
    Respond(Response),
    Fail,
    Hang,
}

/// Network double routed by origin and path; the query is ignored.
///
/// Unrouted URLs fail like an unreachable host.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<FetchRequest>>,
}

fn route_key(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(&self, url: &str, route: Route) {
        let key = route_key(&Url::parse(url).unwrap());
        self.routes.lock().unwrap().insert(key, route);
    }

    pub(crate) fn respond(&self, url: &str, response: Response) {
        self.route(url, Route::Respond(response));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.route(url, Route::Fail);
    }

    /// Never answer requests to `url`.
    pub(crate) fn hang(&self, url: &str) {
        self.route(url, Route::Hang);
    }

    /// Drop every route, taking the whole network down.
    pub(crate) fn fail_all(&self) {
        self.routes.lock().unwrap().clear();
    }

    /// Hold answers to `url` until the returned gate is notified.
    pub(crate) fn gate(&self, url: &str) -> Arc<Notify> {
        let key = route_key(&Url::parse(url).unwrap());
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(key, gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.clone());
        let key = route_key(&request.url);

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let route = self.routes.lock().unwrap().get(&key).cloned();
        match route {
            Some(Route::Respond(mut response)) => {
                if response.url.is_empty() {
                    response.url = request.url.to_string();
                }
                Ok(response)
            }
            Some(Route::Hang) => std::future::pending().await,
            Some(Route::Fail) | None => Err(Error::Network(format!("connection refused: {}", request.url))),
        }
    }
}

/// Storage that lists tiers but fails every other operation.
pub(crate) struct FailingStorage {
    tiers: Vec<String>,
}

impl FailingStorage {
    pub(crate) fn with_tiers(tiers: &[&str]) -> Self {
        Self { tiers: tiers.iter().map(|t| t.to_string()).collect() }
    }

    fn offline<T>() -> Result<T, Error> {
        Err(Error::CorruptEntry("storage offline".into()))
    }
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open_tier(&self, _name: &str) -> Result<(), Error> {
        Self::offline()
    }

    async fn tier_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.tiers.clone())
    }

    async fn delete_tier(&self, _name: &str) -> Result<bool, Error> {
        Self::offline()
    }

    async fn get_entry(&self, _tier: &str, _key: &RequestKey) -> Result<Option<Response>, Error> {
        Self::offline()
    }

    async fn put_entry(&self, _tier: &str, _key: &RequestKey, _response: &Response) -> Result<(), Error> {
        Self::offline()
    }

    async fn entry_urls(&self, _tier: &str) -> Result<Vec<String>, Error> {
        Self::offline()
    }
}
