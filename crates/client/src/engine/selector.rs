//! Strategy selection.
//!
//! Pure classification of a request into a strategy and a tier purpose.
//! Rules are evaluated in order and the first match wins:
//!
//! 1. API marker in the path, or any method other than `GET`: network-first, api tier
//! 2. image destination, or path under the image prefix: cache-first, image tier
//! 3. `/` or a top-level application route: network-first, static tier
//! 4. anything else: stale-while-revalidate, static tier

use serde::Serialize;
use swtier_core::{Destination, Request, RoutingRules, TierPurpose};

/// Read/write/fallback policy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

/// Strategy plus the tier it reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    pub tier: TierPurpose,
}

impl StrategyDecision {
    const fn new(strategy: Strategy, tier: TierPurpose) -> Self {
        Self { strategy, tier }
    }
}

pub fn select(rules: &RoutingRules, request: &Request) -> StrategyDecision {
    let path = request.url.path();

    if !request.is_get() || rules.api_markers.iter().any(|marker| path.contains(marker.as_str())) {
        return StrategyDecision::new(Strategy::NetworkFirst, TierPurpose::Api);
    }

    if request.destination == Destination::Image || path.starts_with(&rules.image_prefix) {
        return StrategyDecision::new(Strategy::CacheFirst, TierPurpose::Image);
    }

    if path == "/" || rules.app_routes.iter().any(|route| path.starts_with(route.as_str())) {
        return StrategyDecision::new(Strategy::NetworkFirst, TierPurpose::Static);
    }

    StrategyDecision::new(Strategy::StaleWhileRevalidate, TierPurpose::Static)
}
