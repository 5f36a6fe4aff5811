//! intercept tool implementation.
//!
//! Delivers one request to the engine as the host would on a fetch event.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swtier_client::{Engine, Interception};
use swtier_core::{Destination, Error, Request, TierPurpose};

use super::{ResponseView, json_result};

/// Input parameters for the intercept tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterceptParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, style, script, image, font, other.
    #[serde(default)]
    pub destination: Destination,

    /// Whether this is a top-level navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Optional request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the intercept tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterceptOutput {
    /// False when the engine declined and the request goes to the network untouched.
    pub handled: bool,
    pub strategy: Option<String>,
    pub tier: Option<TierPurpose>,
    /// Where the response came from: network, cache or fallback.
    pub source: Option<String>,
    pub response: Option<ResponseView>,
}

impl InterceptParams {
    fn into_request(self, engine: &Engine) -> Result<Request, Error> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }
        let url = engine.config().resolve(self.url.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut request = if self.navigate { Request::navigation(url) } else { Request::get(url) };
        request = request.with_method(&self.method);
        if !self.navigate {
            request = request.with_destination(self.destination);
        }
        if let Some(accept) = self.accept {
            request = request.with_accept(accept);
        }
        if let Some(body) = self.body {
            request = request.with_body(body.into_bytes());
        }
        Ok(request)
    }
}

/// Implementation of the intercept tool.
///
/// A request that no strategy and no fallback can serve is an error.
pub async fn intercept_impl(engine: &Engine, params: InterceptParams) -> Result<CallToolResult, McpError> {
    let request = params.into_request(engine)?;

    let output = match engine.on_intercept(&request).await {
        Interception::Passthrough => {
            InterceptOutput { handled: false, strategy: None, tier: None, source: None, response: None }
        }
        Interception::Handled { decision, outcome } => {
            let source = outcome.source().to_string();
            let response = outcome
                .into_result()
                .map_err(|e| Error::NoFallback(format!("{}: {e}", request.url)))?;
            InterceptOutput {
                handled: true,
                strategy: Some(decision.strategy.as_str().to_string()),
                tier: Some(decision.tier),
                source: Some(source),
                response: Some(ResponseView::from(&response)),
            }
        }
    };

    json_result(&output)
}
