//! The authenticated HTTP transport for queries and mutations.

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tifto_auth::TokenSource;
use tracing::debug;

use crate::{
    ErrorSink, GraphQLClientConfig, GraphQLError, GraphQLRequest, GraphQLResponse,
    OperationContext, RequestOptions, Result,
};

pub(crate) struct HttpLink {
    http_client: Client,
    endpoint: String,
    default_headers: Vec<(String, String)>,
    token: Arc<dyn TokenSource>,
    token_timeout: Duration,
    sink: Arc<dyn ErrorSink>,
}

impl HttpLink {
    pub(crate) fn new(
        config: &GraphQLClientConfig,
        token: Arc<dyn TokenSource>,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| GraphQLError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            default_headers: config.default_headers.clone(),
            token,
            token_timeout: config.token_timeout,
            sink,
        })
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `Bearer <token>`, or empty when no token is available.
    ///
    /// One resolution attempt bounded by the token timeout; on timeout the
    /// cached token is used.
    async fn authorization(&self) -> String {
        let token = match tokio::time::timeout(self.token_timeout, self.token.resolve()).await {
            Ok(token) => token,
            Err(_) => {
                debug!("Token resolution timed out; using cached token");
                self.token.cached()
            }
        };
        token.map(|t| format!("Bearer {}", t)).unwrap_or_default()
    }

    /// POST one request. GraphQL errors in the body are reported to the sink
    /// and returned with the response, never converted into `Err`.
    pub(crate) async fn execute(
        &self,
        request: &GraphQLRequest,
        options: &RequestOptions,
    ) -> Result<GraphQLResponse<Value>> {
        let context = OperationContext::new(request.display_name(), request.kind(), &self.endpoint);
        debug!(operation = %context.operation, url = %self.endpoint, "Executing GraphQL request");

        match self.post(request, options).await {
            Ok(response) => {
                if let Some(errors) = response.errors()
                    && !errors.is_empty()
                {
                    self.sink.graphql_errors(&context, errors);
                }
                Ok(response)
            }
            Err(e) => {
                self.sink.network_error(&context, &e);
                Err(e)
            }
        }
    }

    async fn post(
        &self,
        request: &GraphQLRequest,
        options: &RequestOptions,
    ) -> Result<GraphQLResponse<Value>> {
        let mut http_request = self.http_client.post(&self.endpoint);

        for (name, value) in &self.default_headers {
            http_request = http_request.header(name.as_str(), value.as_str());
        }
        for (name, value) in &options.headers {
            http_request = http_request.header(name.as_str(), value.as_str());
        }

        http_request = http_request
            .header(http::header::AUTHORIZATION, self.authorization().await)
            .header(http::header::CONTENT_TYPE, "application/json");

        if let Some(timeout) = options.timeout {
            http_request = http_request.timeout(timeout);
        }

        let response = http_request.json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphQLError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let graphql_response: GraphQLResponse<Value> = response.json().await?;
        Ok(graphql_response)
    }
}
