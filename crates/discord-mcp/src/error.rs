//! Bridge errors and their JSON-RPC classification

use crate::protocol::JsonRpcError;
use crate::validation::ValidationErrors;
use discord_platform::PlatformError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Discord client not ready")]
    NotReady,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidArguments(ValidationErrors),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Failed to {action}: {source}")]
    Platform {
        action: &'static str,
        #[source]
        source: PlatformError,
    },
}

impl BridgeError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Wrap a platform failure with the action that was attempted
    pub fn platform(action: &'static str) -> impl FnOnce(PlatformError) -> Self {
        move |source| Self::Platform { action, source }
    }
}

impl From<ValidationErrors> for BridgeError {
    fn from(errors: ValidationErrors) -> Self {
        Self::InvalidArguments(errors)
    }
}

impl From<BridgeError> for JsonRpcError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err {
            BridgeError::NotReady | BridgeError::Platform { .. } => {
                JsonRpcError::internal_error(message)
            }
            BridgeError::InvalidRequest(_) => JsonRpcError::invalid_request(message),
            BridgeError::InvalidArguments(errors) => JsonRpcError::invalid_request(message)
                .with_data(json!({ "errors": errors })),
            BridgeError::UnknownTool(_) => JsonRpcError::method_not_found(message),
        }
    }
}
