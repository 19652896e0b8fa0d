//! The shared subscription session.
//!
//! One background task owns the socket. It is spawned on the first
//! subscription, performs the `graphql-transport-ws` handshake with a token
//! resolved fresh for every connection, re-sends active subscriptions after
//! a reconnect and backs off exponentially between attempts. Handles talk to
//! it over an unbounded command channel.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tifto_auth::TokenSource;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::subscription::protocol::{self, ClientMessage, ServerMessage};
use crate::{
    ErrorSink, GraphQLError, GraphQLRequest, GraphQLResponse, OperationContext, OperationKind,
    Result, SocketConfig, SubscriptionStream,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ResultSender = mpsc::UnboundedSender<Result<GraphQLResponse<Value>>>;

/// Lifecycle of the subscription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No subscription has been made yet.
    Idle,
    /// First connection attempt in progress.
    Connecting,
    /// Handshake acknowledged.
    Connected,
    /// The connection dropped or failed; attempt `attempt` is pending.
    Reconnecting { attempt: u32 },
    /// Torn down explicitly or out of reconnect attempts.
    Closed,
}

pub(crate) enum Command {
    Subscribe {
        id: String,
        request: GraphQLRequest,
        sender: ResultSender,
    },
    Complete {
        id: String,
    },
    Close,
}

struct SessionContext {
    url: String,
    config: SocketConfig,
    token: Arc<dyn TokenSource>,
    token_timeout: Duration,
    sink: Arc<dyn ErrorSink>,
    state: watch::Sender<SessionState>,
    /// Bumped for every session task; only the newest one may publish state.
    generation: AtomicU64,
}

impl SessionContext {
    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Publish `state` for the session task of `generation`, unless a newer
    /// session has replaced it.
    fn set_session_state(&self, generation: u64, state: SessionState) {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = state;
            true
        });
    }

    async fn bearer(&self) -> Option<String> {
        match tokio::time::timeout(self.token_timeout, self.token.resolve()).await {
            Ok(token) => token,
            Err(_) => {
                debug!("Token resolution timed out; using cached token for socket");
                self.token.cached()
            }
        }
    }
}

struct ActiveSubscription {
    request: GraphQLRequest,
    sender: ResultSender,
}

/// Owns the lazily started session task for one client.
pub(crate) struct SocketLink {
    ctx: Arc<SessionContext>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    next_id: AtomicU64,
}

impl SocketLink {
    pub(crate) fn new(
        url: String,
        config: SocketConfig,
        token: Arc<dyn TokenSource>,
        token_timeout: Duration,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            ctx: Arc::new(SessionContext {
                url,
                config,
                token,
                token_timeout,
                sink,
                state,
                generation: AtomicU64::new(0),
            }),
            commands: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.ctx.url
    }

    pub(crate) fn state(&self) -> watch::Receiver<SessionState> {
        self.ctx.state.subscribe()
    }

    /// Register a subscription, starting the session if none is running.
    pub(crate) fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        let commands = self.session();
        commands
            .send(Command::Subscribe {
                id: id.clone(),
                request,
                sender,
            })
            .map_err(|_| GraphQLError::Subscription("socket session is not running".to_string()))?;
        Ok(SubscriptionStream::new(id, receiver, commands))
    }

    /// Tear down the running session, if any.
    pub(crate) fn close(&self) {
        match self.commands.lock().take() {
            Some(commands) if commands.send(Command::Close).is_ok() => {}
            _ => self.ctx.set_state(SessionState::Closed),
        }
    }

    fn session(&self) -> mpsc::UnboundedSender<Command> {
        let mut guard = self.commands.lock();
        if let Some(commands) = guard.as_ref()
            && !commands.is_closed()
        {
            return commands.clone();
        }
        let (commands, receiver) = mpsc::unbounded_channel();
        let generation = self.ctx.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(run_session(self.ctx.clone(), generation, receiver));
        *guard = Some(commands.clone());
        commands
    }
}

impl Drop for SocketLink {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.get_mut().take() {
            let _ = commands.send(Command::Close);
        }
    }
}

enum Disconnect {
    Closed,
    Dropped(String),
}

async fn run_session(
    ctx: Arc<SessionContext>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut subscriptions: HashMap<String, ActiveSubscription> = HashMap::new();
    let mut attempt: u32 = 0;
    let mut connected_before = false;

    loop {
        if attempt == 0 {
            ctx.set_session_state(generation, SessionState::Connecting);
        }

        let connected = {
            let connecting = connect(&ctx);
            tokio::pin!(connecting);
            let outcome = loop {
                tokio::select! {
                    result = &mut connecting => break Some(result),
                    command = commands.recv() => {
                        if apply_offline(command, &mut subscriptions).is_break() {
                            break None;
                        }
                    }
                }
            };
            match outcome {
                Some(result) => result,
                None => break,
            }
        };

        match connected {
            Ok(ws) => {
                if connected_before {
                    info!(url = %ctx.url, "Subscription socket reconnected");
                } else {
                    info!(url = %ctx.url, "Subscription socket connected");
                }
                connected_before = true;
                attempt = 0;
                ctx.set_session_state(generation, SessionState::Connected);

                match serve(&ctx, ws, &mut subscriptions, &mut commands).await {
                    Disconnect::Closed => break,
                    Disconnect::Dropped(reason) => {
                        warn!(url = %ctx.url, reason = %reason, "Subscription socket disconnected; will reconnect");
                    }
                }
            }
            Err(e) => {
                let context =
                    OperationContext::new("connection_init", OperationKind::Subscription, &ctx.url);
                ctx.sink.network_error(&context, &e);
            }
        }

        attempt = attempt.saturating_add(1);
        if !ctx.config.reconnect.allows(attempt) {
            warn!(url = %ctx.url, "Subscription socket out of reconnect attempts");
            for (_, active) in subscriptions.drain() {
                let _ = active.sender.send(Err(GraphQLError::Connection(
                    "socket reconnect attempts exhausted".to_string(),
                )));
            }
            break;
        }
        ctx.set_session_state(generation, SessionState::Reconnecting { attempt });

        let delay = ctx.config.reconnect.delay_for_attempt(attempt);
        debug!(?delay, attempt, "Waiting before reconnect");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let interrupted = loop {
            tokio::select! {
                _ = &mut sleep => break false,
                command = commands.recv() => {
                    if apply_offline(command, &mut subscriptions).is_break() {
                        break true;
                    }
                }
            }
        };
        if interrupted {
            break;
        }
    }

    ctx.set_session_state(generation, SessionState::Closed);
    debug!(url = %ctx.url, "Subscription session closed");
}

/// Record a command while no socket is open. Breaks when the session must end.
fn apply_offline(
    command: Option<Command>,
    subscriptions: &mut HashMap<String, ActiveSubscription>,
) -> ControlFlow<()> {
    match command {
        None | Some(Command::Close) => ControlFlow::Break(()),
        Some(Command::Subscribe {
            id,
            request,
            sender,
        }) => {
            subscriptions.insert(id, ActiveSubscription { request, sender });
            ControlFlow::Continue(())
        }
        Some(Command::Complete { id }) => {
            subscriptions.remove(&id);
            ControlFlow::Continue(())
        }
    }
}

/// Open the socket and complete the handshake within `connect_timeout`.
async fn connect(ctx: &SessionContext) -> Result<WsStream> {
    let token = ctx.bearer().await;
    let init = ClientMessage::ConnectionInit {
        payload: Some(protocol::connection_params(token.as_deref())),
    };

    tokio::time::timeout(ctx.config.connect_timeout, handshake(&ctx.url, &init))
        .await
        .map_err(|_| GraphQLError::Timeout)?
}

async fn handshake(url: &str, init: &ClientMessage) -> Result<WsStream> {
    let mut request = url
        .into_client_request()
        .map_err(|e| GraphQLError::InvalidUrl(e.to_string()))?;
    request.headers_mut().insert(
        http::header::SEC_WEBSOCKET_PROTOCOL,
        http::HeaderValue::from_static(protocol::SUBPROTOCOL),
    );

    let (mut ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| GraphQLError::Connection(e.to_string()))?;

    send(&mut ws, init).await?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str())? {
                ServerMessage::ConnectionAck { .. } => return Ok(ws),
                ServerMessage::Ping { .. } => {
                    send(&mut ws, &ClientMessage::Pong { payload: None }).await?;
                }
                other => {
                    return Err(GraphQLError::WebSocket(format!(
                        "expected connection_ack, got {:?}",
                        other
                    )));
                }
            },
            Some(Ok(Message::Close(frame))) => {
                return Err(GraphQLError::Connection(format!(
                    "closed during handshake: {:?}",
                    frame
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(GraphQLError::WebSocket(e.to_string())),
            None => {
                return Err(GraphQLError::Connection(
                    "closed during handshake".to_string(),
                ));
            }
        }
    }
}

async fn send<S>(ws: &mut S, message: &ClientMessage) -> Result<()>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| GraphQLError::WebSocket(e.to_string()))
}

/// Pump one established connection until it drops or the session closes.
async fn serve(
    ctx: &SessionContext,
    ws: WsStream,
    subscriptions: &mut HashMap<String, ActiveSubscription>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Disconnect {
    let (mut write, mut read) = ws.split();

    for (id, active) in subscriptions.iter() {
        let message = ClientMessage::Subscribe {
            id: id.clone(),
            payload: active.request.clone(),
        };
        if let Err(e) = send(&mut write, &message).await {
            return Disconnect::Dropped(e.to_string());
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    return Disconnect::Closed;
                }
                Some(Command::Subscribe { id, request, sender }) => {
                    let message = ClientMessage::Subscribe { id: id.clone(), payload: request.clone() };
                    subscriptions.insert(id, ActiveSubscription { request, sender });
                    if let Err(e) = send(&mut write, &message).await {
                        return Disconnect::Dropped(e.to_string());
                    }
                }
                Some(Command::Complete { id }) => {
                    if subscriptions.remove(&id).is_some()
                        && let Err(e) = send(&mut write, &ClientMessage::Complete { id }).await
                    {
                        return Disconnect::Dropped(e.to_string());
                    }
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let server_message = match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => message,
                        Err(e) => {
                            debug!(error = %e, "Ignoring unrecognized socket message");
                            continue;
                        }
                    };
                    if let Some(reply) = dispatch(ctx, server_message, subscriptions)
                        && let Err(e) = send(&mut write, &reply).await
                    {
                        return Disconnect::Dropped(e.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return Disconnect::Dropped(format!("closed by server: {:?}", frame));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Disconnect::Dropped(e.to_string()),
                None => return Disconnect::Dropped("stream ended".to_string()),
            },
        }
    }
}

/// Route one server message to its subscriber. Returns a reply to send, if any.
fn dispatch(
    ctx: &SessionContext,
    message: ServerMessage,
    subscriptions: &mut HashMap<String, ActiveSubscription>,
) -> Option<ClientMessage> {
    match message {
        ServerMessage::Next { id, payload } => {
            let Some(active) = subscriptions.get(&id) else {
                return None;
            };
            if let Some(errors) = payload.errors()
                && !errors.is_empty()
            {
                ctx.sink
                    .graphql_errors(&context_for(ctx, &active.request), errors);
            }
            if active.sender.send(Ok(payload)).is_err() {
                subscriptions.remove(&id);
                return Some(ClientMessage::Complete { id });
            }
            None
        }
        ServerMessage::Error { id, payload } => {
            if let Some(active) = subscriptions.remove(&id) {
                ctx.sink
                    .graphql_errors(&context_for(ctx, &active.request), &payload);
                let _ = active.sender.send(Err(GraphQLError::GraphQL(payload)));
            }
            None
        }
        ServerMessage::Complete { id } => {
            subscriptions.remove(&id);
            None
        }
        ServerMessage::Ping { .. } => Some(ClientMessage::Pong { payload: None }),
        ServerMessage::Pong { .. } | ServerMessage::ConnectionAck { .. } => None,
    }
}

fn context_for(ctx: &SessionContext, request: &GraphQLRequest) -> OperationContext {
    OperationContext::new(request.display_name(), OperationKind::Subscription, &ctx.url)
}
