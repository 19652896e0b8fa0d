//! GraphQL request payloads and builders.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::{
    FetchPolicy, GraphQLClient, GraphQLResponse, OperationKind, Result, SubscriptionStream,
};

/// GraphQL request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// The GraphQL document.
    pub query: String,
    /// Operation name (for documents with multiple operations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variables for the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Protocol extensions, e.g. persisted query hashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLRequest {
    /// Create a new request.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
            extensions: None,
        }
    }

    /// Select the operation to run when the document holds several.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Replace the variables with anything serializable to a JSON value.
    pub fn variables<T: Serialize>(mut self, variables: T) -> Self {
        self.variables = Some(serde_json::to_value(variables).unwrap_or_default());
        self
    }

    pub fn extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Classify the selected operation of this document.
    pub fn kind(&self) -> OperationKind {
        OperationKind::of(&self.query, self.operation_name.as_deref())
    }

    /// Name used in logs: the operation name, else the operation kind.
    pub fn display_name(&self) -> &str {
        self.operation_name
            .as_deref()
            .unwrap_or_else(|| self.kind().as_str())
    }

    /// Cache key over document, operation name and variables.
    pub(crate) fn cache_key(&self) -> String {
        serde_json::to_string(&(&self.query, &self.operation_name, &self.variables))
            .unwrap_or_else(|_| self.query.clone())
    }
}

impl<V: Serialize> From<graphql_client::QueryBody<V>> for GraphQLRequest {
    fn from(body: graphql_client::QueryBody<V>) -> Self {
        let variables = serde_json::to_value(&body.variables)
            .ok()
            .filter(|v| !v.is_null());
        Self {
            query: body.query.to_string(),
            operation_name: Some(body.operation_name.to_string()),
            variables,
            extensions: None,
        }
    }
}

/// Per-request knobs for the HTTP path.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// How the response cache is consulted.
    pub fetch_policy: FetchPolicy,
    /// Extra headers for this request only.
    pub headers: Vec<(String, String)>,
    /// Overrides the client's request timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_fetch_policy(fetch_policy: FetchPolicy) -> Self {
        Self {
            fetch_policy,
            ..Self::default()
        }
    }
}

/// Fluent form of [`GraphQLClient::execute_with`] for queries.
pub struct QueryBuilder<'a> {
    client: &'a GraphQLClient,
    request: GraphQLRequest,
    options: RequestOptions,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(client: &'a GraphQLClient, query: impl Into<String>) -> Self {
        Self {
            client,
            request: GraphQLRequest::new(query),
            options: RequestOptions::default(),
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.request.operation_name = Some(name.into());
        self
    }

    /// Replace the variables with anything serializable to a JSON value.
    pub fn variables<T: Serialize>(mut self, variables: T) -> Self {
        self.request = self.request.variables(variables);
        self
    }

    /// Add one variable, keeping the others.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let vars = self
            .request
            .variables
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = vars {
            map.insert(name.into(), serde_json::to_value(value).unwrap_or_default());
        }
        self
    }

    /// Set the fetch policy.
    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.options.fetch_policy = policy;
        self
    }

    /// Override the client timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Extra header sent with this request only.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    /// Execute and return the raw response, partial data and errors included.
    pub async fn send_raw(self) -> Result<GraphQLResponse<Value>> {
        self.client.execute_with(self.request, &self.options).await
    }

    /// Execute and deserialize the data, failing on any GraphQL error.
    pub async fn send<T: DeserializeOwned>(self) -> Result<T> {
        self.send_raw().await?.decode::<T>()?.into_result()
    }

    /// Execute and deserialize the data, keeping GraphQL errors alongside.
    pub async fn send_response<T: DeserializeOwned>(self) -> Result<GraphQLResponse<T>> {
        self.send_raw().await?.decode()
    }
}

/// Mutation builder. Mutations always hit the network and are never cached.
pub struct MutationBuilder<'a> {
    inner: QueryBuilder<'a>,
}

impl<'a> MutationBuilder<'a> {
    pub(crate) fn new(client: &'a GraphQLClient, mutation: impl Into<String>) -> Self {
        Self {
            inner: QueryBuilder::new(client, mutation).fetch_policy(FetchPolicy::NoCache),
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.operation_name(name);
        self
    }

    pub fn variables<T: Serialize>(mut self, variables: T) -> Self {
        self.inner = self.inner.variables(variables);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.inner = self.inner.variable(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Execute the mutation and return the raw response.
    pub async fn send_raw(self) -> Result<GraphQLResponse<Value>> {
        self.inner.send_raw().await
    }

    /// Execute the mutation and deserialize the response.
    pub async fn send<T: DeserializeOwned>(self) -> Result<T> {
        self.inner.send().await
    }
}

/// Subscription builder.
pub struct SubscriptionBuilder<'a> {
    client: &'a GraphQLClient,
    request: GraphQLRequest,
}

impl<'a> SubscriptionBuilder<'a> {
    pub(crate) fn new(client: &'a GraphQLClient, subscription: impl Into<String>) -> Self {
        Self {
            client,
            request: GraphQLRequest::new(subscription),
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.request.operation_name = Some(name.into());
        self
    }

    pub fn variables<T: Serialize>(mut self, variables: T) -> Self {
        self.request = self.request.variables(variables);
        self
    }

    /// Start the subscription on the shared socket session.
    pub async fn send(self) -> Result<SubscriptionStream> {
        self.client.subscribe_request(self.request).await
    }
}
