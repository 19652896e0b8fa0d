//! Memoized clients per endpoint pair.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tifto_auth::TokenSource;
use tifto_config::TransportSettings;
use tracing::info;

use crate::{
    EndpointConfig, ErrorSink, GraphQLClient, GraphQLClientConfig, Result, TracingErrorSink,
};

/// Hands out one shared client per normalized `(http, ws)` pair.
///
/// Construct one per application scope and pass it where clients are
/// needed. Rebuilding with unchanged endpoints returns the same client, so
/// no duplicate socket sessions are opened.
pub struct ClientRegistry {
    token: Arc<dyn TokenSource>,
    sink: Arc<dyn ErrorSink>,
    base: GraphQLClientConfig,
    clients: Mutex<HashMap<EndpointConfig, GraphQLClient>>,
}

impl ClientRegistry {
    pub fn new(token: Arc<dyn TokenSource>) -> Self {
        Self {
            token,
            sink: Arc::new(TracingErrorSink),
            base: GraphQLClientConfig::default(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Timeouts and reconnect policy taken from transport settings.
    pub fn from_settings(settings: &TransportSettings, token: Arc<dyn TokenSource>) -> Self {
        Self::new(token).with_config(GraphQLClientConfig::from_settings(settings))
    }

    /// Base configuration for every built client; endpoints are overridden per build.
    pub fn with_config(mut self, base: GraphQLClientConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The client for this pair of base URLs, built on first use.
    pub fn build(&self, http_base: &str, ws_base: &str) -> Result<GraphQLClient> {
        let endpoints = EndpointConfig::new(http_base, ws_base);
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&endpoints) {
            return Ok(client.clone());
        }

        let config = GraphQLClientConfig {
            endpoint: endpoints.http_url.clone(),
            ws_endpoint: endpoints.ws_url.clone(),
            ..self.base.clone()
        };
        let client = GraphQLClient::builder()
            .config(config)
            .token_source(self.token.clone())
            .error_sink(self.sink.clone())
            .build()?;

        info!(http = %endpoints.http_url, ws = %endpoints.ws_url, "Built GraphQL client");
        clients.insert(endpoints, client.clone());
        Ok(client)
    }

    /// The client for the endpoints in `settings`.
    pub fn client_for(&self, settings: &TransportSettings) -> Result<GraphQLClient> {
        self.build(&settings.server_url, &settings.ws_server_url)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Close every socket session and forget all clients.
    pub fn shutdown(&self) {
        let clients: Vec<GraphQLClient> = self.clients.lock().drain().map(|(_, c)| c).collect();
        for client in clients {
            client.close();
            client.reset_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tifto_auth::StaticToken;

    #[test]
    fn test_same_pair_same_client() {
        let registry = ClientRegistry::new(Arc::new(StaticToken::anonymous()));
        let a = registry.build("http://h", "ws://h").unwrap();
        let b = registry.build("http://h/graphql/", "ws://h/").unwrap();
        let c = registry.build("http://other", "ws://h").unwrap();

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_shutdown_forgets_clients() {
        let registry = ClientRegistry::new(Arc::new(StaticToken::new("t")));
        let a = registry.build("http://h", "ws://h").unwrap();
        registry.shutdown();
        assert!(registry.is_empty());

        let b = registry.build("http://h", "ws://h").unwrap();
        assert!(!a.ptr_eq(&b));
    }
}
