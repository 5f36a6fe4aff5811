//! MCP server handler implementation.
//!
//! This module defines the host handler that
//! routes tool calls to the engine.
use std::sync::Arc;

use crate::tools::cache::{CacheLookupParams, CacheTiersParams, lookup_impl, tiers_impl};
use crate::tools::intercept::{InterceptParams, intercept_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swtier_client::Engine;

/// The MCP handler of the swtier host.
#[derive(Clone)]
pub struct SwtierHost {
    engine: Arc<Engine>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwtierHost {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    /// Deliver one request to the caching engine.
    #[tool(
        description = "Deliver one request to the caching engine. Returns the chosen strategy, tier, response source and the response."
    )]
    async fn intercept(&self, params: Parameters<InterceptParams>) -> Result<CallToolResult, McpError> {
        intercept_impl(&self.engine, params.0).await
    }

    #[tool(description = "Read one cached entry from a current tier without contacting the network.")]
    async fn cache_lookup(&self, params: Parameters<CacheLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.engine, params.0).await
    }

    #[tool(description = "List stored cache tiers, their entry counts and whether each belongs to the running version.")]
    async fn cache_tiers(&self, params: Parameters<CacheTiersParams>) -> Result<CallToolResult, McpError> {
        tiers_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for SwtierHost {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swtier-host".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
