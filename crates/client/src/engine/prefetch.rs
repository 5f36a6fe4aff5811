//! Install-time population of the current tiers.
//!
//! Core resources are fetched in parallel, cache-busted and with caching
//! disabled upstream, then stored under their original URL in the tier the
//! selector reads them from. Secondary resources are fetched plainly and
//! silently skipped on failure.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use swtier_core::cache::RequestKey;
use swtier_core::{Error, TierNames, TierPurpose, TierRegistry};
use url::Url;

use super::timed_fetch;
use crate::fetch::{CacheMode, FetchRequest, Network, cache_bust};

/// An entry of a prefetch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub url: Url,
    pub is_core: bool,
    /// Tier a `GET` of `url` is served from.
    pub tier: TierPurpose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    pub cached: Vec<String>,
    pub failed: Vec<PrefetchFailure>,
}

/// Fetch one resource and store it under its original URL.
async fn fetch_into(
    network: &dyn Network, registry: &TierRegistry, names: &TierNames, resource: &ResourceDescriptor,
    timeout: Duration,
) -> Result<(), Error> {
    let request = if resource.is_core {
        let stamp = chrono::Utc::now().timestamp_millis();
        FetchRequest::get(cache_bust(&resource.url, stamp)).with_cache_mode(CacheMode::NoCache)
    } else {
        FetchRequest::get(resource.url.clone())
    };

    let response = timed_fetch(network, &request, timeout).await?;
    if !response.is_success() {
        return Err(Error::HttpError(format!("status {} for {}", response.status, resource.url)));
    }

    registry.handle(names.name(resource.tier)).put(&RequestKey::get(&resource.url), &response).await
}

/// Cache every core resource; one failure never stops the others.
pub async fn prefetch_core(
    network: &dyn Network, registry: &TierRegistry, names: &TierNames, resources: &[ResourceDescriptor],
    timeout: Duration,
) -> PrefetchReport {
    tracing::info!(count = resources.len(), "caching core assets");

    let results = join_all(resources.iter().map(|resource| async move {
        (resource, fetch_into(network, registry, names, resource, timeout).await)
    }))
    .await;

    let mut report = PrefetchReport::default();
    for (resource, result) in results {
        match result {
            Ok(()) => report.cached.push(resource.url.to_string()),
            Err(e) => {
                tracing::error!(url = %resource.url, error = %e, "failed to cache core asset");
                report.failed.push(PrefetchFailure { url: resource.url.to_string(), error: e.to_string() });
            }
        }
    }
    report
}

/// Best-effort caching of secondary resources.
pub async fn prefetch_secondary(
    network: Arc<dyn Network>, registry: TierRegistry, names: TierNames, resources: Vec<ResourceDescriptor>,
    timeout: Duration,
) {
    tracing::info!(count = resources.len(), "caching secondary assets");
    let (network, registry, names) = (network.as_ref(), &registry, &names);
    join_all(resources.iter().map(|resource| async move {
        if let Err(e) = fetch_into(network, registry, names, resource, timeout).await {
            tracing::debug!(url = %resource.url, error = %e, "skipped secondary asset");
        }
    }))
    .await;
}
