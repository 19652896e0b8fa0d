//! GraphQL transport error types.

use std::sync::Arc;
use thiserror::Error;

/// Result type for GraphQL transport operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;

/// An error shared between a handle's state, its refetch callers and its
/// callbacks.
pub type SharedError = Arc<GraphQLError>;

/// GraphQL transport errors.
#[derive(Debug, Error)]
pub enum GraphQLError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GraphQL errors returned by the server.
    #[error("GraphQL errors: {}", format_errors(.0))]
    GraphQL(Vec<crate::GraphQLResponseError>),

    /// WebSocket error (for subscriptions).
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout error.
    #[error("Request timed out")]
    Timeout,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Subscription error.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Session store or identity provider failure.
    #[error("Auth error: {0}")]
    Auth(#[from] tifto_auth::AuthError),

    /// The query handle was released before the operation settled.
    #[error("Query handle released")]
    Released,
}

fn format_errors(errors: &[crate::GraphQLResponseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl GraphQLError {
    /// Check if this is a network error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Status { .. } | Self::Connection(_) | Self::WebSocket(_) | Self::Timeout
        )
    }

    /// Check if this is a GraphQL error (server-side).
    pub fn is_graphql_error(&self) -> bool {
        matches!(self, Self::GraphQL(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout) || matches!(self, Self::Http(e) if e.is_timeout())
    }

    /// Get GraphQL errors if this is a GraphQL error.
    pub fn graphql_errors(&self) -> Option<&[crate::GraphQLResponseError]> {
        match self {
            Self::GraphQL(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphQLResponseError;

    #[test]
    fn test_classification() {
        assert!(GraphQLError::Timeout.is_network_error());
        assert!(GraphQLError::Timeout.is_timeout());
        assert!(GraphQLError::Status { status: 502, body: String::new() }.is_network_error());

        let err = GraphQLError::GraphQL(vec![GraphQLResponseError::new("boom")]);
        assert!(err.is_graphql_error());
        assert!(!err.is_network_error());
        assert_eq!(err.graphql_errors().map(|e| e.len()), Some(1));
    }

    #[test]
    fn test_graphql_error_display_lists_messages() {
        let err = GraphQLError::GraphQL(vec![
            GraphQLResponseError::new("first"),
            GraphQLResponseError::new("second"),
        ]);
        assert_eq!(err.to_string(), "GraphQL errors: first; second");
    }
}
