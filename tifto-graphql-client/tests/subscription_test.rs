//! Subscription session tests against an in-process graphql-transport-ws server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tifto_auth::{StaticToken, TokenSource};
use tifto_graphql_client::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Init(Value),
    Subscribe { id: String, payload: Value },
    Complete(String),
    Pong,
}

struct TestServer {
    url: String,
    events: mpsc::UnboundedReceiver<Event>,
}

impl TestServer {
    async fn start(drop_first_connection: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (events, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut connection = 0;
            while let Ok((stream, _)) = listener.accept().await {
                connection += 1;
                let drop_after_next = drop_first_connection && connection == 1;
                tokio::spawn(serve_connection(stream, events.clone(), drop_after_next, connection));
            }
        });

        Self {
            url,
            events: receiver,
        }
    }

    /// Next event satisfying `predicate`; other events are skipped.
    async fn expect(&mut self, predicate: impl Fn(&Event) -> bool) -> Event {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.expect("server stopped");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for server event")
    }
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

async fn serve_connection(
    stream: TcpStream,
    events: mpsc::UnboundedSender<Event>,
    drop_after_next: bool,
    connection: usize,
) {
    let callback = |_: &Request, mut response: Response| {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("graphql-transport-ws"));
        Ok::<_, ErrorResponse>(response)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(raw) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(raw.as_str()).unwrap();
        match value["type"].as_str() {
            Some("connection_init") => {
                let _ = events.send(Event::Init(value["payload"].clone()));
                let _ = ws.send(text(json!({ "type": "connection_ack" }))).await;
                let _ = ws.send(text(json!({ "type": "ping" }))).await;
            }
            Some("subscribe") => {
                let id = value["id"].as_str().unwrap().to_string();
                let payload = value["payload"].clone();
                let _ = events.send(Event::Subscribe {
                    id: id.clone(),
                    payload: payload.clone(),
                });

                if payload["query"].as_str().unwrap_or("").contains("restricted") {
                    let _ = ws
                        .send(text(json!({
                            "type": "error",
                            "id": id,
                            "payload": [{ "message": "Not authorized" }]
                        })))
                        .await;
                    continue;
                }

                let _ = ws
                    .send(text(json!({
                        "type": "next",
                        "id": id,
                        "payload": { "data": { "connection": connection } }
                    })))
                    .await;
                if drop_after_next {
                    let _ = ws.close(None).await;
                    return;
                }
            }
            Some("complete") => {
                let id = value["id"].as_str().unwrap().to_string();
                let _ = events.send(Event::Complete(id));
            }
            Some("pong") => {
                let _ = events.send(Event::Pong);
            }
            _ => {}
        }
    }
}

/// Hands out `token-1`, `token-2`, ... on successive resolutions.
#[derive(Default)]
struct CountingToken {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenSource for CountingToken {
    async fn resolve(&self) -> Option<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("token-{}", n))
    }

    fn cached(&self) -> Option<String> {
        None
    }
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig::default()
        .with_initial_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(200))
}

fn client(ws_url: &str, token: Arc<dyn TokenSource>, reconnect: ReconnectConfig) -> GraphQLClient {
    let config = GraphQLClientConfig::builder()
        .endpoint("http://127.0.0.1:9")
        .ws_endpoint(ws_url)
        .connect_timeout(Duration::from_secs(2))
        .reconnect(reconnect)
        .build();
    GraphQLClient::builder()
        .config(config)
        .token_source(token)
        .build()
        .unwrap()
}

fn record_states(client: &GraphQLClient) -> Arc<Mutex<Vec<SessionState>>> {
    let mut receiver = client.session_state();
    let log = Arc::new(Mutex::new(vec![*receiver.borrow()]));
    let out = log.clone();
    tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            out.lock().push(*receiver.borrow_and_update());
        }
    });
    log
}

async fn next_item(stream: &mut SubscriptionStream) -> Option<Result<GraphQLResponse>> {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("timed out waiting for subscription item")
}

async fn wait_for_state(client: &GraphQLClient, wanted: SessionState) {
    let mut receiver = client.session_state();
    tokio::time::timeout(WAIT, receiver.wait_for(|state| *state == wanted))
        .await
        .expect("timed out waiting for session state")
        .unwrap();
}

#[tokio::test]
async fn test_socket_opens_lazily_with_both_header_casings() {
    let mut server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::new("abc")), fast_reconnect());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.events.try_recv().is_err());
    assert_eq!(*client.session_state().borrow(), SessionState::Idle);

    let mut stream = client
        .subscribe("subscription OrderPlaced { subscribePlaceOrder { origin } }")
        .send()
        .await
        .unwrap();

    let Event::Init(payload) = server.expect(|e| matches!(e, Event::Init(_))).await else {
        unreachable!()
    };
    assert_eq!(payload["Authorization"], "Bearer abc");
    assert_eq!(payload["authorization"], "Bearer abc");

    let response = next_item(&mut stream).await.unwrap().unwrap();
    assert_eq!(response.data.unwrap()["connection"], 1);
    wait_for_state(&client, SessionState::Connected).await;
}

#[tokio::test]
async fn test_anonymous_handshake_payload_is_empty() {
    let mut server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let _stream = client.subscribe("subscription { zoneUpdated { _id } }").send().await.unwrap();

    let event = server.expect(|e| matches!(e, Event::Init(_))).await;
    assert_eq!(event, Event::Init(json!({})));
}

#[tokio::test]
async fn test_reconnect_resolves_token_again_and_resubscribes() {
    let mut server = TestServer::start(true).await;
    let client = client(&server.url, Arc::new(CountingToken::default()), fast_reconnect());
    let states = record_states(&client);

    let mut stream = client
        .subscribe("subscription RiderMoved { riderLocation { lat lng } }")
        .operation_name("RiderMoved")
        .send()
        .await
        .unwrap();

    let first = next_item(&mut stream).await.unwrap().unwrap();
    assert_eq!(first.data.unwrap()["connection"], 1);

    let second = next_item(&mut stream).await.unwrap().unwrap();
    assert_eq!(second.data.unwrap()["connection"], 2);

    let Event::Init(first_init) = server.expect(|e| matches!(e, Event::Init(_))).await else {
        unreachable!()
    };
    let Event::Subscribe { id: first_id, .. } =
        server.expect(|e| matches!(e, Event::Subscribe { .. })).await
    else {
        unreachable!()
    };
    let Event::Init(second_init) = server.expect(|e| matches!(e, Event::Init(_))).await else {
        unreachable!()
    };
    let Event::Subscribe { id: second_id, payload } =
        server.expect(|e| matches!(e, Event::Subscribe { .. })).await
    else {
        unreachable!()
    };

    assert_eq!(first_init["authorization"], "Bearer token-1");
    assert_eq!(second_init["Authorization"], "Bearer token-2");
    assert_eq!(first_id, second_id);
    assert_eq!(payload["operationName"], "RiderMoved");

    let states = states.lock().clone();
    let expected = [
        SessionState::Idle,
        SessionState::Connecting,
        SessionState::Connected,
        SessionState::Reconnecting { attempt: 1 },
        SessionState::Connected,
    ];
    let mut cursor = states.iter();
    for wanted in expected {
        assert!(
            cursor.any(|state| *state == wanted),
            "missing {:?} in {:?}",
            wanted,
            states
        );
    }
}

#[tokio::test]
async fn test_server_ping_is_answered() {
    let mut server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let _stream = client.subscribe("subscription { zoneUpdated { _id } }").send().await.unwrap();

    assert_eq!(server.expect(|e| *e == Event::Pong).await, Event::Pong);
}

#[tokio::test]
async fn test_dropping_stream_sends_complete() {
    let mut server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let mut stream = client
        .subscribe("subscription { orderStatusChanged { _id } }")
        .send()
        .await
        .unwrap();
    next_item(&mut stream).await.unwrap().unwrap();
    let id = stream.id().to_string();
    drop(stream);

    assert_eq!(
        server.expect(|e| matches!(e, Event::Complete(_))).await,
        Event::Complete(id)
    );
}

#[tokio::test]
async fn test_error_message_ends_stream() {
    let server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let mut stream = client
        .subscribe("subscription { restrictedFeed { _id } }")
        .send()
        .await
        .unwrap();

    let err = next_item(&mut stream).await.unwrap().unwrap_err();
    assert_eq!(err.graphql_errors().unwrap()[0].message, "Not authorized");
    assert!(next_item(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_close_then_lazy_restart() {
    let mut server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let mut stream = client.subscribe("subscription { a }").send().await.unwrap();
    next_item(&mut stream).await.unwrap().unwrap();

    client.close();
    wait_for_state(&client, SessionState::Closed).await;
    drop(stream);

    let mut restarted = client.subscribe("subscription { b }").send().await.unwrap();
    let response = next_item(&mut restarted).await.unwrap().unwrap();
    assert_eq!(response.data.unwrap()["connection"], 2);

    server.expect(|e| matches!(e, Event::Init(_))).await;
    server.expect(|e| matches!(e, Event::Init(_))).await;
}

#[tokio::test]
async fn test_replaced_session_keeps_its_state() {
    let server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let mut stream = client.subscribe("subscription { a }").send().await.unwrap();
    next_item(&mut stream).await.unwrap().unwrap();

    client.close();
    let mut restarted = client.subscribe("subscription { b }").send().await.unwrap();
    let response = next_item(&mut restarted).await.unwrap().unwrap();
    assert_eq!(response.data.unwrap()["connection"], 2);
    wait_for_state(&client, SessionState::Connected).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*client.session_state().borrow(), SessionState::Connected);
    drop(stream);
}

#[tokio::test]
async fn test_exhausted_reconnects_fail_streams() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let reconnect = fast_reconnect().with_max_attempts(2);
    let client = client(&url, Arc::new(StaticToken::anonymous()), reconnect);

    let mut stream = client.subscribe("subscription { a }").send().await.unwrap();
    let err = next_item(&mut stream).await.unwrap().unwrap_err();

    assert!(matches!(err, GraphQLError::Connection(_)));
    assert!(next_item(&mut stream).await.is_none());
    wait_for_state(&client, SessionState::Closed).await;
}

#[tokio::test]
async fn test_execute_routes_subscription_to_socket() {
    let server = TestServer::start(false).await;
    let client = client(&server.url, Arc::new(StaticToken::anonymous()), fast_reconnect());

    let request = GraphQLRequest::new("subscription { dispatchQueue { _id } }");
    assert_eq!(client.route(&request), Route::Socket);

    let response = client.execute(request, FetchPolicy::NetworkOnly).await.unwrap();
    assert_eq!(response.data.unwrap()["connection"], 1);
}
