// Tifto transport - the GraphQL transport core of the Tifto admin
//
// Bearer token resolution, a client routing operations between HTTP and a
// shared graphql-transport-ws socket, and query handles on top of it.

// Re-export optional crates
#[cfg(feature = "config")]
pub use tifto_config;

#[cfg(feature = "auth")]
pub use tifto_auth;

#[cfg(feature = "graphql-client")]
pub use tifto_graphql_client;

// Prelude for common imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use tifto_config::{ConfigError, TransportSettings};

    #[cfg(feature = "auth")]
    pub use tifto_auth::{
        BackendSession, FileStore, MemoryStore, StaticToken, StorageKeys, TokenResolver, TokenSource,
    };

    #[cfg(feature = "graphql-client")]
    pub use tifto_graphql_client::{
        ClientRegistry, ErrorPolicy, ErrorSink, FetchPolicy, GraphQLClient, GraphQLError,
        GraphQLRequest, GraphQLResponse, QueryExecutor, QueryHandle, QueryOptions, QueryState,
        SessionState, SubscriptionStream,
    };
}
