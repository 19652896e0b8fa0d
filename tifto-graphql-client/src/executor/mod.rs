//! Query handles: gated, debounced, retrying and polling execution of one query.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tifto_graphql_client::{GraphQLClient, GraphQLRequest, QueryExecutor, QueryOptions};
//!
//! # async fn example() -> tifto_graphql_client::Result<()> {
//! let client = GraphQLClient::new("https://api.example.com", "wss://api.example.com")?;
//! let executor = QueryExecutor::new(Arc::new(client));
//!
//! let handle = executor.execute(
//!     GraphQLRequest::new("query Orders($page: Int) { orders(page: $page) { _id } }")
//!         .variables(serde_json::json!({ "page": 1 })),
//!     QueryOptions::new().poll_interval(Duration::from_secs(30)),
//! );
//!
//! let orders = handle.refetch(Some(serde_json::json!({ "page": 2 }))).await;
//! # let _ = orders;
//! # Ok(())
//! # }
//! ```

mod driver;
mod handle;
mod options;

pub use handle::QueryHandle;
pub use options::{CompletedCallback, ErrorCallback, ErrorPolicy, QueryOptions};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::{FetchPolicy, GraphQLClient, GraphQLRequest, GraphQLResponse, Result, SharedError};
use driver::Driver;

/// Outcome of a `refetch`.
pub type RefetchResult = std::result::Result<Option<Value>, SharedError>;

/// What a query handle sends its operations through.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Execute one request. The fetch policy is interpreted here, not by the handle.
    async fn execute(
        &self,
        request: GraphQLRequest,
        fetch_policy: FetchPolicy,
    ) -> Result<GraphQLResponse<Value>>;

    /// A cached response usable before (or instead of) a network call.
    fn read_cache(
        &self,
        _request: &GraphQLRequest,
        _fetch_policy: FetchPolicy,
    ) -> Option<GraphQLResponse<Value>> {
        None
    }
}

/// Snapshot of a handle.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub data: Option<Value>,
    pub error: Option<SharedError>,
    /// An execution or a debounced refetch is pending.
    pub loading: bool,
}

impl QueryState {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

/// Creates query handles over one transport.
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn QueryTransport>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    pub fn from_client(client: GraphQLClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// Start a handle for `request`. Must be called inside a Tokio runtime.
    ///
    /// An enabled handle executes once immediately. A handle of any kind
    /// starts from the cached response when the fetch policy reads the cache.
    pub fn execute(&self, request: GraphQLRequest, options: QueryOptions) -> QueryHandle {
        let cached = self
            .transport
            .read_cache(&request, options.fetch_policy)
            .and_then(|response| response.data);
        let initial = QueryState {
            data: cached,
            error: None,
            loading: options.enabled,
        };

        let (state_tx, state_rx) = watch::channel(initial);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(self.transport.clone(), request, options, state_tx);
        let task = tokio::spawn(driver.run(commands_rx));

        QueryHandle::new(state_rx, commands_tx, task)
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor").finish_non_exhaustive()
    }
}
