//! Bridge Server
//!
//! Dispatches MCP requests to the tool registry and the resource catalog.
//! `tools/call` and `resources/read` are refused until the Discord session
//! is ready.

use crate::error::BridgeError;
use crate::lifecycle::Readiness;
use crate::protocol::{JsonRpcError, McpRequest, McpResponse, PROTOCOL_VERSION};
use crate::resources;
use crate::tool_registry::ToolRegistry;
use crate::tools;
use discord_platform::Platform;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "discord-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name and version reported by `initialize`
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        }
    }
}

pub struct BridgeServer {
    info: ServerInfo,
    platform: Arc<dyn Platform>,
    readiness: Readiness,
    tools: ToolRegistry,
}

impl BridgeServer {
    pub fn new(info: ServerInfo, platform: Arc<dyn Platform>, readiness: Readiness) -> Self {
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry);
        Self {
            info,
            platform,
            readiness,
            tools: registry,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Handle an MCP request
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        debug!(method = %request.method, "Handling MCP request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "notifications/initialized" | "initialized" => {
                McpResponse::success(request.id, json!({}))
            }
            "ping" => McpResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(request),
            "resources/read" => self.handle_resources_read(request).await,
            _ => McpResponse::error(
                request.id,
                JsonRpcError::method_not_found(format!("Method not found: {}", request.method)),
            ),
        }
    }

    fn handle_initialize(&self, request: McpRequest) -> McpResponse {
        let client = request
            .params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .and_then(|ci| ci.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        info!(client = %client, "Client connected");

        McpResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false }
                },
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: McpRequest) -> McpResponse {
        McpResponse::success(request.id, json!({ "tools": self.tools.definitions() }))
    }

    async fn handle_tools_call(&self, request: McpRequest) -> McpResponse {
        let params = match &request.params {
            Some(p) if p.is_object() => p,
            _ => {
                return McpResponse::error(request.id, JsonRpcError::invalid_params("Missing params"))
            }
        };

        let tool_name = match params.get("name").and_then(|n| n.as_str()) {
            Some(n) => n.to_string(),
            None => {
                return McpResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Missing tool name"),
                )
            }
        };

        if !self.readiness.is_ready() {
            return McpResponse::error(request.id, BridgeError::NotReady.into());
        }

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self
            .tools
            .execute(&tool_name, self.platform.as_ref(), arguments)
            .await
        {
            Ok(text) => McpResponse::text(request.id, text),
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool call failed");
                McpResponse::error(request.id, e.into())
            }
        }
    }

    fn handle_resources_list(&self, request: McpRequest) -> McpResponse {
        McpResponse::success(
            request.id,
            json!({ "resources": resources::list_resources() }),
        )
    }

    async fn handle_resources_read(&self, request: McpRequest) -> McpResponse {
        let uri = match request.param_str("uri") {
            Some(uri) => uri.to_string(),
            None => return McpResponse::error(request.id, JsonRpcError::invalid_params("Missing uri")),
        };

        if !self.readiness.is_ready() {
            return McpResponse::error(request.id, BridgeError::NotReady.into());
        }

        match resources::read_resource(self.platform.as_ref(), &uri).await {
            Ok(contents) => McpResponse::success(request.id, json!({ "contents": [contents] })),
            Err(e) => {
                warn!(uri = %uri, error = %e, "Resource read failed");
                McpResponse::error(request.id, e.into())
            }
        }
    }
}
