//! The single observation point for transport failures.
//!
//! Every network failure and every GraphQL `errors` entry passes through an
//! [`ErrorSink`] before the caller sees the result. The sink only observes:
//! the caller still receives the error (or the partial data plus errors)
//! unchanged.

use crate::{GraphQLError, GraphQLResponseError, OperationKind};
use tracing::error;

/// What was being attempted when a failure occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    /// Operation name, or the operation kind for anonymous documents.
    pub operation: String,
    pub kind: OperationKind,
    /// Target endpoint.
    pub url: String,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>, kind: OperationKind, url: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            kind,
            url: url.into(),
        }
    }
}

/// Receives every transport failure.
pub trait ErrorSink: Send + Sync {
    /// A request or socket failed before producing a GraphQL result.
    fn network_error(&self, context: &OperationContext, error: &GraphQLError);

    /// The server answered with an `errors` array (with or without data).
    fn graphql_errors(&self, context: &OperationContext, errors: &[GraphQLResponseError]);
}

/// Logs failures as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

/// Coarse network failure classes used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The server responded, but not with a usable status (often CORS or gateway).
    Status,
    /// No connection could be made.
    Unreachable,
    Other,
}

impl NetworkFailure {
    pub fn classify(error: &GraphQLError) -> Self {
        match error {
            GraphQLError::Status { .. } => Self::Status,
            GraphQLError::Http(e) if e.is_status() => Self::Status,
            GraphQLError::Http(e) if e.is_connect() || e.is_timeout() => Self::Unreachable,
            GraphQLError::Connection(_) | GraphQLError::Timeout => Self::Unreachable,
            _ => Self::Other,
        }
    }
}

impl ErrorSink for TracingErrorSink {
    fn network_error(&self, context: &OperationContext, err: &GraphQLError) {
        match NetworkFailure::classify(err) {
            NetworkFailure::Status => error!(
                operation = %context.operation,
                url = %context.url,
                error = %err,
                "CORS or network error; check that the backend allows this origin"
            ),
            NetworkFailure::Unreachable => error!(
                operation = %context.operation,
                url = %context.url,
                error = %err,
                "Network request failed; backend down or unreachable"
            ),
            NetworkFailure::Other => error!(
                operation = %context.operation,
                url = %context.url,
                error = %err,
                "Network error"
            ),
        }
    }

    fn graphql_errors(&self, context: &OperationContext, errors: &[GraphQLResponseError]) {
        for e in errors {
            error!(
                operation = %context.operation,
                url = %context.url,
                message = %e.message,
                path = e.path_string().as_deref().unwrap_or(""),
                locations = e.locations_string().as_deref().unwrap_or(""),
                "GraphQL error"
            );
        }
    }
}
