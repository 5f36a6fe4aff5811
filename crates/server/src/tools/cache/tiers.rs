//! cache_tiers tool implementation.
//!
//! Lists every stored tier and whether it belongs to the running version.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swtier_client::Engine;

use crate::tools::json_result;

/// Parameters for the cache_tiers tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheTiersParams {
    /// Include the URL of every entry.
    #[serde(default)]
    pub include_urls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TierInfo {
    pub name: String,
    /// False for tiers of a superseded version awaiting cleanup.
    pub current: bool,
    pub entries: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

/// Output from the cache_tiers tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheTiersOutput {
    pub version: String,
    pub phase: String,
    pub tiers: Vec<TierInfo>,
}

/// Implementation of the cache_tiers tool.
pub async fn tiers_impl(engine: &Engine, params: CacheTiersParams) -> Result<CallToolResult, McpError> {
    let registry = engine.registry();
    let mut tiers = Vec::new();
    for name in registry.keys().await? {
        let urls = registry.handle(&name).urls().await?;
        tiers.push(TierInfo {
            current: engine.tier_names().contains(&name),
            entries: urls.len(),
            urls: if params.include_urls { urls } else { Vec::new() },
            name,
        });
    }

    let output = CacheTiersOutput {
        version: engine.config().cache_version.clone(),
        phase: engine.phase().as_str().to_string(),
        tiers,
    };
    json_result(&output)
}
