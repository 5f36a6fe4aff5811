use std::sync::Arc;

use swtier_core::cache::RequestKey;
use swtier_core::{Destination, Error, Request, TierHandle};
use tokio::sync::oneshot;

use super::{Engine, Outcome, timed_fetch};
use crate::fetch::FetchRequest;

impl Engine {
    /// Cache hit without network contact; on a miss, fetch and store.
    ///
    /// Only reached through [`Engine::on_intercept`], which has already
    /// passed untrusted origins through.
    pub(crate) async fn cache_first(&self, request: &Request, tier: &TierHandle) -> Outcome {
        let key = RequestKey::for_request(request);
        if let Some(hit) = self.lookup(tier, &key).await {
            return Outcome::Cache(hit);
        }

        match self.fetch(request).await {
            Ok(response) => {
                self.store(tier, request, &key, &response).await;
                Outcome::Network(response)
            }
            Err(e) if request.destination == Destination::Image => {
                tracing::debug!(url = %request.url, error = %e, "serving image placeholder");
                Outcome::Fallback(self.image_placeholder(request).await)
            }
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Network wins when it answers with 2xx; the cache covers everything else.
    pub(crate) async fn network_first(&self, request: &Request, tier: &TierHandle) -> Outcome {
        let key = RequestKey::for_request(request);
        match self.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.store(tier, request, &key, &response).await;
                Outcome::Network(response)
            }
            Ok(response) => match self.lookup(tier, &key).await {
                Some(cached) => Outcome::Cache(cached),
                None => Outcome::Network(response),
            },
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying cache");
                match self.lookup(tier, &key).await {
                    Some(cached) => Outcome::Cache(cached),
                    None => self.network_fallback(request, e).await,
                }
            }
        }
    }

    /// Serve the cached copy at once and refresh it in the background.
    ///
    /// On a miss the caller gets the network result, failures included.
    pub(crate) async fn stale_while_revalidate(&self, request: &Request, tier: &TierHandle) -> Outcome {
        let key = RequestKey::for_request(request);
        let (tx, rx) = oneshot::channel();

        let network = Arc::clone(&self.network);
        let fetch = FetchRequest::from_request(request);
        let timeout = self.timeout;
        let writer = tier.clone();
        let store_key = key.clone();
        let task = tokio::spawn(async move {
            let result = timed_fetch(network.as_ref(), &fetch, timeout).await;
            let fresh = match &result {
                Ok(response) if response.is_success() => Some(response.clone()),
                _ => None,
            };
            // The receiver is gone once a cached copy was served.
            let _ = tx.send(result);

            if let Some(response) = fresh {
                match writer.put(&store_key, &response).await {
                    Ok(()) => tracing::debug!(tier = writer.name(), url = %store_key.url, "revalidated"),
                    Err(e) => tracing::warn!(tier = writer.name(), url = %store_key.url, error = %e, "cache write failed"),
                }
            }
        });

        let cached = self.lookup(tier, &key).await;
        self.track(task).await;
        if let Some(hit) = cached {
            return Outcome::Cache(hit);
        }

        match rx.await {
            Ok(Ok(response)) => Outcome::Network(response),
            Ok(Err(e)) => Outcome::Failed(e),
            Err(_) => Outcome::Failed(Error::Network(format!("revalidation of {} was cancelled", request.url))),
        }
    }
}
