//! Transport Layer
//!
//! Newline-delimited JSON-RPC over stdin/stdout.

mod stdio;

pub use stdio::{serve_stream, StdioTransport};

use anyhow::Result;
use std::sync::Arc;

/// Anything that can answer an MCP request
#[async_trait::async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse;
}

/// Transport trait - implement for new transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests until the peer closes the stream
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()>;
}

#[async_trait::async_trait]
impl McpHandler for crate::BridgeServer {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse {
        self.handle_request(request).await
    }
}
