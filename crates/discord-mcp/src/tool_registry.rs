//! Tool Registry
//!
//! Tools are registered once at startup and listed in registration order.
//! Lookup is by exact name.

use crate::error::BridgeError;
use async_trait::async_trait;
use discord_platform::Platform;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A `tools/call` target
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    /// Validate `arguments`, talk to Discord and return the text payload.
    async fn execute(&self, platform: &dyn Platform, arguments: Value)
        -> Result<String, BridgeError>;
}

pub type BoxedTool = Arc<dyn Tool>;

/// Descriptor returned by `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: BoxedTool) {
        debug!(tool = %tool.name(), "Registered tool");
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<BoxedTool> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn execute(
        &self,
        name: &str,
        platform: &dyn Platform,
        arguments: Value,
    ) -> Result<String, BridgeError> {
        let tool = self
            .get(name)
            .ok_or_else(|| BridgeError::UnknownTool(name.to_string()))?;
        tool.execute(platform, arguments).await
    }
}
