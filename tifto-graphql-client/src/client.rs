//! GraphQL client implementation.

use async_trait::async_trait;
use futures::StreamExt;
use graphql_client::GraphQLQuery;
use serde_json::Value;
use std::sync::Arc;
use tifto_auth::{StaticToken, TokenSource};
use tokio::sync::watch;
use tracing::debug;

use crate::http_link::HttpLink;
use crate::socket::SocketLink;
use crate::{
    EndpointConfig, ErrorSink, FetchPolicy, GraphQLClientConfig, GraphQLError, GraphQLRequest,
    GraphQLResponse, MutationBuilder, OperationKind, QueryBuilder, QueryTransport, RequestOptions,
    ResponseCache, Result, Route, SessionState, SubscriptionBuilder, SubscriptionStream,
    TracingErrorSink,
};

/// A routed, authenticated GraphQL client.
///
/// Queries and mutations go over HTTP; subscriptions share one lazily
/// started socket session. Clones share the same transports and cache.
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: GraphQLClientConfig,
    http: HttpLink,
    socket: SocketLink,
    cache: ResponseCache,
}

impl GraphQLClient {
    /// Unauthenticated client for a pair of base URLs.
    pub fn new(http_base: &str, ws_base: &str) -> Result<Self> {
        Self::with_config(GraphQLClientConfig::new(http_base, ws_base))
    }

    /// Unauthenticated client with custom configuration.
    pub fn with_config(config: GraphQLClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a client builder.
    pub fn builder() -> GraphQLClientBuilder {
        GraphQLClientBuilder::default()
    }

    /// Get the configuration.
    pub fn config(&self) -> &GraphQLClientConfig {
        &self.inner.config
    }

    /// The endpoints this client talks to.
    pub fn endpoints(&self) -> EndpointConfig {
        EndpointConfig {
            http_url: self.inner.http.endpoint().to_string(),
            ws_url: self.inner.socket.url().to_string(),
        }
    }

    /// Create a query builder.
    pub fn query(&self, query: impl Into<String>) -> QueryBuilder<'_> {
        QueryBuilder::new(self, query)
    }

    /// Create a mutation builder.
    pub fn mutation(&self, mutation: impl Into<String>) -> MutationBuilder<'_> {
        MutationBuilder::new(self, mutation)
    }

    /// Create a subscription builder.
    pub fn subscribe(&self, subscription: impl Into<String>) -> SubscriptionBuilder<'_> {
        SubscriptionBuilder::new(self, subscription)
    }

    /// Run an operation generated by `graphql_client`'s derive.
    pub async fn request<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<GraphQLResponse<Q::ResponseData>> {
        let request = GraphQLRequest::from(Q::build_query(variables));
        self.execute(request, FetchPolicy::default()).await?.decode()
    }

    /// Which transport `request` takes.
    pub fn route(&self, request: &GraphQLRequest) -> Route {
        Route::for_kind(request.kind())
    }

    /// Execute one request with a fetch policy.
    ///
    /// ```
    /// use tifto_graphql_client::{FetchPolicy, GraphQLClient, GraphQLRequest};
    ///
    /// # tokio_test::block_on(async {
    /// let client = GraphQLClient::new("http://localhost:4000", "ws://localhost:4000").unwrap();
    /// let request = GraphQLRequest::new("query Zones { zones { _id } }");
    ///
    /// // Nothing cached yet and the network is never consulted.
    /// let response = client.execute(request, FetchPolicy::CacheOnly).await.unwrap();
    /// assert!(response.data.is_none());
    /// # });
    /// ```
    pub async fn execute(
        &self,
        request: GraphQLRequest,
        fetch_policy: FetchPolicy,
    ) -> Result<GraphQLResponse<Value>> {
        self.execute_with(request, &RequestOptions::with_fetch_policy(fetch_policy))
            .await
    }

    /// Execute one request.
    ///
    /// A subscription document resolves with its first result. Mutations
    /// always reach the network and are never cached.
    pub async fn execute_with(
        &self,
        request: GraphQLRequest,
        options: &RequestOptions,
    ) -> Result<GraphQLResponse<Value>> {
        match request.kind() {
            OperationKind::Subscription => {
                let mut stream = self.subscribe_request(request).await?;
                stream.next().await.unwrap_or_else(|| {
                    Err(GraphQLError::Subscription(
                        "subscription completed without a result".to_string(),
                    ))
                })
            }
            OperationKind::Mutation => self.inner.http.execute(&request, options).await,
            OperationKind::Query => self.execute_query(request, options).await,
        }
    }

    async fn execute_query(
        &self,
        request: GraphQLRequest,
        options: &RequestOptions,
    ) -> Result<GraphQLResponse<Value>> {
        let policy = options.fetch_policy;
        let cache = &self.inner.cache;

        match policy {
            FetchPolicy::CacheOnly => {
                return Ok(cache.get(&request).unwrap_or_default());
            }
            FetchPolicy::CacheFirst => {
                if let Some(cached) = cache.get(&request) {
                    debug!(operation = %request.display_name(), "Serving query from cache");
                    return Ok(cached);
                }
            }
            _ => {}
        }

        let response = self.inner.http.execute(&request, options).await?;
        if policy.writes_cache() {
            cache.put(&request, &response);
        }
        Ok(response)
    }

    /// Start a subscription on the shared socket session.
    pub async fn subscribe_request(&self, request: GraphQLRequest) -> Result<SubscriptionStream> {
        debug!(operation = %request.display_name(), url = %self.inner.socket.url(), "Starting GraphQL subscription");
        self.inner.socket.subscribe(request)
    }

    /// A cached response for `request`, if the policy reads the cache.
    pub fn read_cache(
        &self,
        request: &GraphQLRequest,
        fetch_policy: FetchPolicy,
    ) -> Option<GraphQLResponse<Value>> {
        if fetch_policy.reads_cache() && request.kind() == OperationKind::Query {
            self.inner.cache.get(request)
        } else {
            None
        }
    }

    /// Forget every cached response.
    pub fn reset_cache(&self) {
        self.inner.cache.clear();
    }

    /// Observe the subscription session lifecycle.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.inner.socket.state()
    }

    /// Tear down the socket session. A later subscription starts a new one.
    pub fn close(&self) {
        self.inner.socket.close();
    }

    /// Whether both handles share the same underlying client.
    pub fn ptr_eq(&self, other: &GraphQLClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("endpoint", &self.inner.config.endpoint)
            .field("ws_endpoint", &self.inner.config.ws_endpoint)
            .finish()
    }
}

#[async_trait]
impl QueryTransport for GraphQLClient {
    async fn execute(
        &self,
        request: GraphQLRequest,
        fetch_policy: FetchPolicy,
    ) -> Result<GraphQLResponse<Value>> {
        GraphQLClient::execute(self, request, fetch_policy).await
    }

    fn read_cache(
        &self,
        request: &GraphQLRequest,
        fetch_policy: FetchPolicy,
    ) -> Option<GraphQLResponse<Value>> {
        GraphQLClient::read_cache(self, request, fetch_policy)
    }
}

/// Builder for [`GraphQLClient`].
#[derive(Default)]
pub struct GraphQLClientBuilder {
    config: GraphQLClientConfig,
    token: Option<Arc<dyn TokenSource>>,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl GraphQLClientBuilder {
    /// Use this configuration. Endpoints are normalized on build.
    pub fn config(mut self, config: GraphQLClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach tokens from this source to every operation.
    pub fn token_source(mut self, token: Arc<dyn TokenSource>) -> Self {
        self.token = Some(token);
        self
    }

    /// Report transport failures to this sink instead of `tracing`.
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<GraphQLClient> {
        let mut config = self.config;
        let endpoints = config.endpoints();
        config.endpoint = endpoints.http_url;
        config.ws_endpoint = endpoints.ws_url;

        let token = self
            .token
            .unwrap_or_else(|| Arc::new(StaticToken::anonymous()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingErrorSink));

        let http = HttpLink::new(&config, token.clone(), sink.clone())?;
        let socket = SocketLink::new(
            config.ws_endpoint.clone(),
            config.socket.clone(),
            token,
            config.token_timeout,
            sink,
        );
        let cache = ResponseCache::new(config.cache_ttl);

        Ok(GraphQLClient {
            inner: Arc::new(ClientInner {
                config,
                http,
                socket,
                cache,
            }),
        })
    }
}
