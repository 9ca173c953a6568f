//! Error types for the Discord platform client

use thiserror::Error;

/// Errors raised by the gateway session, the cache or the REST client
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Discord answered with a non-success status and a JSON error body
    #[error("Discord API error {status} (code {code}): {message}")]
    Api {
        status: u16,
        code: u64,
        message: String,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using [`PlatformError`]
pub type Result<T> = std::result::Result<T, PlatformError>;

impl PlatformError {
    pub fn gateway(msg: impl Into<String>) -> Self {
        PlatformError::Gateway(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        PlatformError::NotFound(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        PlatformError::Authentication(msg.into())
    }

    /// Whether the failure means the addressed entity does not exist
    /// (or is not visible to the session).
    pub fn is_not_found(&self) -> bool {
        match self {
            PlatformError::NotFound(_) => true,
            PlatformError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PlatformError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PlatformError::Gateway(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = PlatformError::Api {
            status: 403,
            code: 50013,
            message: "Missing Permissions".into(),
        };
        assert_eq!(
            err.to_string(),
            "Discord API error 403 (code 50013): Missing Permissions"
        );
    }

    #[test]
    fn test_is_not_found() {
        let api_404 = PlatformError::Api {
            status: 404,
            code: 10003,
            message: "Unknown Channel".into(),
        };
        assert!(api_404.is_not_found());
        assert!(PlatformError::not_found("channel 1").is_not_found());
        assert!(!PlatformError::gateway("closed").is_not_found());
    }
}
