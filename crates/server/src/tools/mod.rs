//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swtier host.

pub mod cache;
pub mod intercept;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swtier_core::{Error, Response};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderView {
    pub name: String,
    pub value: String,
}

/// A response as returned to the MCP client.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub url: String,
    pub status: u16,
    pub headers: Vec<HeaderView>,
    /// Body length in bytes.
    pub body_len: usize,
    /// The body, when it is valid UTF-8.
    pub body_text: Option<String>,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            headers: response
                .headers
                .iter()
                .map(|(name, value)| HeaderView { name: name.clone(), value: value.clone() })
                .collect(),
            body_len: response.body.len(),
            body_text: std::str::from_utf8(&response.body).ok().map(str::to_string),
        }
    }
}

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
