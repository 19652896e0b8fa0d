//! Query handles running through a real client and its response cache.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tifto_auth::StaticToken;
use tifto_graphql_client::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GraphQLClient {
    GraphQLClient::builder()
        .config(GraphQLClientConfig::new(&server.uri(), "ws://127.0.0.1:9"))
        .token_source(Arc::new(StaticToken::anonymous()))
        .build()
        .unwrap()
}

fn ok_body(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

/// First request answers `{ n: 1 }`, every later one `{ n: 2 }`.
async fn mount_versions(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ok_body(json!({ "n": 1 })))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ok_body(json!({ "n": 2 })))
        .mount(server)
        .await;
}

fn zones() -> GraphQLRequest {
    GraphQLRequest::new("query Zones { zones { _id } }")
}

#[tokio::test]
async fn test_cache_first_refetch_reaches_network() {
    let server = MockServer::start().await;
    mount_versions(&server).await;
    let client = client_for(&server);
    let executor = QueryExecutor::from_client(client.clone());

    let mut handle = executor.execute(zones(), QueryOptions::new().debounce(Duration::from_millis(10)));
    let state = handle.wait_until(|state| !state.loading && state.data.is_some()).await;
    assert_eq!(state.data, Some(json!({ "n": 1 })));
    assert_eq!(request_count(&server).await, 1);

    let data = handle.refetch(None).await.unwrap();
    assert_eq!(data, Some(json!({ "n": 2 })));
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(handle.data(), Some(json!({ "n": 2 })));

    let cached = client.read_cache(&zones(), FetchPolicy::CacheFirst).unwrap();
    assert_eq!(cached.data, Some(json!({ "n": 2 })));
}

#[tokio::test]
async fn test_cache_first_poll_reaches_network() {
    let server = MockServer::start().await;
    mount_versions(&server).await;
    let executor = QueryExecutor::from_client(client_for(&server));

    let mut handle = executor.execute(
        zones(),
        QueryOptions::new().poll_interval(Duration::from_millis(200)),
    );
    handle.wait_until(|state| !state.loading && state.data.is_some()).await;

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(request_count(&server).await >= 4);
    assert_eq!(handle.data(), Some(json!({ "n": 2 })));
}

#[tokio::test]
async fn test_no_cache_refetch_and_poll_reach_network() {
    let server = MockServer::start().await;
    mount_versions(&server).await;
    let client = client_for(&server);
    let executor = QueryExecutor::from_client(client.clone());

    let mut handle = executor.execute(
        zones(),
        QueryOptions::new()
            .fetch_policy(FetchPolicy::NoCache)
            .debounce(Duration::from_millis(10))
            .poll_interval(Duration::from_millis(200)),
    );
    handle.wait_until(|state| !state.loading && state.data.is_some()).await;

    let data = handle.refetch(None).await.unwrap();
    assert_eq!(data, Some(json!({ "n": 2 })));

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(request_count(&server).await >= 4);
    assert!(client.read_cache(&zones(), FetchPolicy::CacheFirst).is_none());
}

#[tokio::test]
async fn test_cache_first_initial_load_uses_cache() {
    let server = MockServer::start().await;
    mount_versions(&server).await;
    let client = client_for(&server);
    client.execute(zones(), FetchPolicy::CacheFirst).await.unwrap();
    assert_eq!(request_count(&server).await, 1);

    let executor = QueryExecutor::from_client(client);
    let mut handle = executor.execute(zones(), QueryOptions::new().debounce(Duration::from_millis(10)));
    let state = handle.wait_until(|state| !state.loading).await;
    assert_eq!(state.data, Some(json!({ "n": 1 })));
    assert_eq!(request_count(&server).await, 1);

    handle.refetch(None).await.unwrap();
    assert_eq!(request_count(&server).await, 2);
}
