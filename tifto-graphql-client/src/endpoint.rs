//! Endpoint normalization.

use tifto_config::TransportSettings;

const GRAPHQL_SEGMENT: &str = "/graphql";

/// Normalize a base URL into a GraphQL endpoint.
///
/// Surrounding whitespace and trailing slashes are removed, an existing
/// `/graphql` segment is dropped along with any slashes before it, then a
/// single `/graphql` segment is appended. Normalizing an already normalized
/// URL returns it unchanged.
pub fn normalize_graphql_url(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    let origin = match trimmed.strip_suffix(GRAPHQL_SEGMENT) {
        Some(rest) => rest.trim_end_matches('/'),
        None => trimmed,
    };
    format!("{}{}", origin, GRAPHQL_SEGMENT)
}

/// The pair of endpoints one client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointConfig {
    /// Queries and mutations.
    pub http_url: String,
    /// Subscriptions.
    pub ws_url: String,
}

impl EndpointConfig {
    /// Normalize both base URLs.
    pub fn new(http_base: &str, ws_base: &str) -> Self {
        Self {
            http_url: normalize_graphql_url(http_base),
            ws_url: normalize_graphql_url(ws_base),
        }
    }

    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self::new(&settings.server_url, &settings.ws_server_url)
    }
}
