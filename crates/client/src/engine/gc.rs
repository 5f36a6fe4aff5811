//! Version cutover: deletion of tiers that belong to superseded versions.

use futures_util::future::join_all;
use serde::Serialize;
use swtier_core::{TierNames, TierRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every stored tier that is not in `known`, concurrently.
///
/// Best effort: enumeration and deletion failures are logged and reported,
/// never returned.
pub async fn collect_stale_tiers(registry: &TierRegistry, known: &TierNames) -> GcReport {
    let stored = match registry.keys().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not enumerate cache tiers; skipping cleanup");
            return GcReport::default();
        }
    };

    let stale: Vec<String> = stored.into_iter().filter(|name| !known.contains(name)).collect();
    let results = join_all(stale.iter().map(|name| async move {
        tracing::info!(tier = %name, "deleting old cache tier");
        (name, registry.delete(name).await)
    }))
    .await;

    let mut report = GcReport::default();
    for (name, result) in results {
        match result {
            Ok(_) => report.deleted.push(name.clone()),
            Err(e) => {
                tracing::warn!(tier = %name, error = %e, "failed to delete cache tier");
                report.failed.push(name.clone());
            }
        }
    }
    report
}
