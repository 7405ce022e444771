//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine.
use std::sync::Arc;

use crate::tools::{
    CacheListParams, SwFetchParams, SwNotificationClickParams, SwPushParams, fetch_impl, list_impl,
    notification_click_impl, push_impl, status_impl,
};

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
use swcache_core::CacheDb;
use swcache_engine::Registration;
use url::Url;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    registration: Arc<Registration>,
    db: CacheDb,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwCacheServer {
    pub fn new(registration: Arc<Registration>, db: CacheDb, origin: Url) -> Self {
        Self { registration, db, origin, tool_router: Self::tool_router() }
    }

    /// Send a request through the active worker as a controlled page would.
    #[tool(
        description = "Fetch a URL through the service worker. Navigations are network-first, same-origin assets stale-while-revalidate, cross-origin requests pass through uncached."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, &self.origin, params.0).await
    }

    #[tool(description = "Deliver a push message. Shows a notification with defaults for missing title, body and url.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.registration, params.0)
    }

    #[tool(description = "Click a shown notification: closes it and focuses or opens a window at its url.")]
    async fn sw_notification_click(
        &self, params: Parameters<SwNotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.registration, params.0)
    }

    #[tool(description = "List cache generations, optionally with the entry URLs of one generation.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.db, params.0).await
    }

    #[tool(description = "Show the active worker version and state, connected clients and shown notifications.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration)
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
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
