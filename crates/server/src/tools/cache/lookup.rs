//! cache_lookup tool implementation.
//!
//! Reads one entry of a current tier without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swtier_client::Engine;
use swtier_core::cache::RequestKey;
use swtier_core::{Error, TierPurpose};

use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupParams {
    /// Tier to read: static, api or image.
    pub tier: TierPurpose,

    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method of the cached request (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupOutput {
    /// Versioned name of the tier searched.
    pub tier: String,
    /// Request identity hash.
    pub key: String,
    pub entry: Option<ResponseView>,
}

/// Implementation of the cache_lookup tool.
pub async fn lookup_impl(engine: &Engine, params: CacheLookupParams) -> Result<CallToolResult, McpError> {
    let url = engine
        .config()
        .resolve(params.url.trim())
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = RequestKey::new(params.method.as_deref().unwrap_or("GET"), &url);

    let name = engine.tier_names().name(params.tier);
    let entry = engine.registry().handle(name).lookup(&key).await?;

    let output = CacheLookupOutput {
        tier: name.to_string(),
        key: key.hash.clone(),
        entry: entry.as_ref().map(ResponseView::from),
    };
    json_result(&output)
}
