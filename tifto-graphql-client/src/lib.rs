//! # Tifto GraphQL Client
//!
//! The transport core of the Tifto admin: a routed, authenticated GraphQL
//! client and a query executor on top of it.
//!
//! ## Features
//!
//! - **Routing**: subscriptions travel over a shared `graphql-transport-ws`
//!   socket, queries and mutations over HTTP, decided per operation
//! - **Auth**: a bearer token from a [`tifto_auth::TokenSource`] on every
//!   request and every socket handshake
//! - **Reconnect**: lazy socket start, bounded connect, exponential backoff
//! - **Fetch policies**: an in-memory response cache behind [`FetchPolicy`]
//! - **Query handles**: gating, debounced and retried refetch, polling,
//!   stale-result suppression
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tifto_auth::{MemoryStore, TokenResolver};
//! use tifto_graphql_client::ClientRegistry;
//!
//! # async fn run() -> tifto_graphql_client::Result<()> {
//! let resolver = TokenResolver::new(Arc::new(MemoryStore::new()));
//! let registry = ClientRegistry::new(Arc::new(resolver));
//! let client = registry.build("https://ftifto-backend.onrender.com", "wss://ftifto-backend.onrender.com")?;
//!
//! let response = client
//!     .query("query Zones { zones { _id title } }")
//!     .send_raw()
//!     .await?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```
//!
//! ## Subscriptions
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use tifto_graphql_client::GraphQLClient;
//!
//! # async fn run() -> tifto_graphql_client::Result<()> {
//! let client = GraphQLClient::new("https://api.example.com", "wss://api.example.com")?;
//!
//! let mut orders = client
//!     .subscribe("subscription { subscribePlaceOrder(restaurant: \"r1\") { origin } }")
//!     .send()
//!     .await?;
//!
//! while let Some(result) = orders.next().await {
//!     match result {
//!         Ok(response) => println!("Received: {:?}", response.data),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod endpoint;
mod error;
pub mod executor;
mod http_link;
mod operation;
mod registry;
mod request;
mod response;
mod sink;
mod socket;
mod subscription;

pub use cache::{FetchPolicy, ResponseCache};
pub use client::{GraphQLClient, GraphQLClientBuilder};
pub use config::{GraphQLClientConfig, GraphQLClientConfigBuilder, ReconnectConfig, SocketConfig};
pub use endpoint::{EndpointConfig, normalize_graphql_url};
pub use error::{GraphQLError, Result, SharedError};
pub use executor::{
    ErrorPolicy, QueryExecutor, QueryHandle, QueryOptions, QueryState, QueryTransport,
    RefetchResult,
};
pub use operation::{OperationKind, Route};
pub use registry::ClientRegistry;
pub use request::{GraphQLRequest, MutationBuilder, QueryBuilder, RequestOptions, SubscriptionBuilder};
pub use response::{ErrorLocation, GraphQLResponse, GraphQLResponseError, PathSegment, format_path};
pub use sink::{ErrorSink, NetworkFailure, OperationContext, TracingErrorSink};
pub use socket::SessionState;
pub use subscription::{SubscriptionStream, protocol};

// Re-export common types
pub use serde_json::Value as JsonValue;
