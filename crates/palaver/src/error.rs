//! Gateway Error Types
//!
//! One taxonomy shared by every component. Per-request failures are
//! converted into transport error envelopes at the adapter boundary;
//! only `Configuration` is allowed to abort startup.

use thiserror::Error;

/// Errors produced by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid configuration detected at construction time. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tool, resource, or route that does not exist. Recoverable,
    /// returned to the caller as a structured not-found response.
    #[error("{0}")]
    NotFound(String),

    /// Malformed request envelope or missing required field.
    #[error("{0}")]
    Validation(String),

    /// A capability handler failed. The message is surfaced to the
    /// caller; internal detail stays in the logs.
    #[error("{0}")]
    Execution(String),

    /// Connection-level failure. Terminates only the affected
    /// connection, never the server.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl GatewayError {
    /// Not-found error for an unknown tool name.
    pub fn tool_not_found(name: &str) -> Self {
        GatewayError::NotFound(format!("Tool {} not found", name))
    }

    /// Not-found error for a URI no resource template matches.
    pub fn no_matching_resource(uri: &str) -> Self {
        GatewayError::NotFound(format!("No resource matches {}", uri))
    }

    /// True when the error is fatal at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_wording() {
        let err = GatewayError::tool_not_found("missing");
        assert_eq!(err.to_string(), "Tool missing not found");
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(GatewayError::Configuration("no transports".into()).is_fatal());
        assert!(!GatewayError::tool_not_found("x").is_fatal());
        assert!(!GatewayError::Validation("bad envelope".into()).is_fatal());
        assert!(!GatewayError::Execution("handler failed".into()).is_fatal());
    }
}
