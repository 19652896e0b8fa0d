//! GraphQL client configuration.

use std::time::Duration;
use tifto_config::TransportSettings;

use crate::EndpointConfig;

/// GraphQL client configuration.
#[derive(Debug, Clone)]
pub struct GraphQLClientConfig {
    /// GraphQL endpoint URL (normalized on build).
    pub endpoint: String,
    /// WebSocket endpoint URL for subscriptions (normalized on build).
    pub ws_endpoint: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Bound on one token resolution before falling back to the cached token.
    pub token_timeout: Duration,
    /// Response cache TTL.
    pub cache_ttl: Duration,
    /// Subscription session settings.
    pub socket: SocketConfig,
}

impl Default for GraphQLClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4000/graphql".to_string(),
            ws_endpoint: "ws://localhost:4000/graphql".to_string(),
            timeout: Duration::from_secs(30),
            default_headers: Vec::new(),
            user_agent: format!("tifto-graphql-client/{}", env!("CARGO_PKG_VERSION")),
            token_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(300),
            socket: SocketConfig::default(),
        }
    }
}

impl GraphQLClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GraphQLClientConfigBuilder {
        GraphQLClientConfigBuilder::default()
    }

    /// Configuration for a pair of base URLs.
    pub fn new(http_base: &str, ws_base: &str) -> Self {
        let endpoints = EndpointConfig::new(http_base, ws_base);
        Self {
            endpoint: endpoints.http_url,
            ws_endpoint: endpoints.ws_url,
            ..Default::default()
        }
    }

    /// Configuration derived from resolved transport settings.
    pub fn from_settings(settings: &TransportSettings) -> Self {
        let endpoints = EndpointConfig::from_settings(settings);
        let mut reconnect = ReconnectConfig::default();
        reconnect.max_attempts = settings.reconnect_attempts;
        Self {
            endpoint: endpoints.http_url,
            ws_endpoint: endpoints.ws_url,
            timeout: settings.request_timeout,
            token_timeout: settings.token_timeout,
            socket: SocketConfig {
                connect_timeout: settings.connect_timeout,
                reconnect,
            },
            ..Default::default()
        }
    }

    /// The normalized endpoint pair.
    pub fn endpoints(&self) -> EndpointConfig {
        EndpointConfig::new(&self.endpoint, &self.ws_endpoint)
    }
}

/// Builder for GraphQL client configuration.
#[derive(Debug, Default)]
pub struct GraphQLClientConfigBuilder {
    config: GraphQLClientConfig,
}

impl GraphQLClientConfigBuilder {
    /// Set the GraphQL endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the WebSocket endpoint for subscriptions.
    pub fn ws_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.ws_endpoint = endpoint.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .push((name.into(), value.into()));
        self
    }

    /// Set user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Bound token resolution per request.
    pub fn token_timeout(mut self, timeout: Duration) -> Self {
        self.config.token_timeout = timeout;
        self
    }

    /// Set response cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the socket connect (and acknowledgement) timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket.connect_timeout = timeout;
        self
    }

    /// Set the socket reconnection policy.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.socket.reconnect = reconnect;
        self
    }

    /// Build the configuration, normalizing both endpoints.
    pub fn build(mut self) -> GraphQLClientConfig {
        let endpoints = self.config.endpoints();
        self.config.endpoint = endpoints.http_url;
        self.config.ws_endpoint = endpoints.ws_url;
        self.config
    }
}

/// Subscription session settings.
///
/// The session always starts lazily, on the first subscription.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Bound on connect plus `connection_ack`.
    pub connect_timeout: Duration,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnection policy for the socket session.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts; `None` is unbounded.
    pub max_attempts: Option<u32>,
    /// Delay before the first reconnection.
    pub initial_delay: Duration,
    /// Maximum delay between reconnections.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Set maximum attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before reconnection attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Whether attempt `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_endpoints() {
        let config = GraphQLClientConfig::builder()
            .endpoint("https://api.example.com/")
            .ws_endpoint("wss://api.example.com/graphql/")
            .timeout(Duration::from_secs(60))
            .build();

        assert_eq!(config.endpoint, "https://api.example.com/graphql");
        assert_eq!(config.ws_endpoint, "wss://api.example.com/graphql");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_settings() {
        let settings = TransportSettings {
            reconnect_attempts: Some(7),
            connect_timeout: Duration::from_secs(12),
            ..TransportSettings::default()
        };
        let config = GraphQLClientConfig::from_settings(&settings);

        assert_eq!(config.endpoint, "https://ftifto-backend.onrender.com/graphql");
        assert_eq!(config.socket.connect_timeout, Duration::from_secs(12));
        assert_eq!(config.socket.reconnect.max_attempts, Some(7));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(reconnect.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(reconnect.delay_for_attempt(5), Duration::from_secs(16));
        assert_eq!(reconnect.delay_for_attempt(6), Duration::from_secs(30));
        assert_eq!(reconnect.delay_for_attempt(500), Duration::from_secs(30));
    }

    #[test]
    fn test_unbounded_by_default() {
        let reconnect = ReconnectConfig::default();
        assert!(reconnect.allows(u32::MAX));
        assert!(!reconnect.with_max_attempts(3).allows(4));
    }
}
