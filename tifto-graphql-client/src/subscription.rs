//! GraphQL subscription streams.

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::socket::Command;
use crate::{GraphQLResponse, Result};

/// Results of one subscription on the shared socket session.
///
/// Each item is one `next` payload, partial data and errors included. A
/// terminal `error` message or an exhausted reconnect budget yields a final
/// `Err`. Dropping the stream sends `complete` for its id.
pub struct SubscriptionStream {
    id: String,
    receiver: mpsc::UnboundedReceiver<Result<GraphQLResponse<Value>>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SubscriptionStream {
    pub(crate) fn new(
        id: String,
        receiver: mpsc::UnboundedReceiver<Result<GraphQLResponse<Value>>>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            receiver,
            commands,
        }
    }

    /// Protocol id of this subscription.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deserialize each payload, failing items that carry GraphQL errors.
    pub fn typed<T: DeserializeOwned>(self) -> impl Stream<Item = Result<T>> + Send {
        self.map(|item| item.and_then(|response| response.decode::<T>()?.into_result()))
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<GraphQLResponse<Value>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Complete {
            id: self.id.clone(),
        });
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("id", &self.id)
            .finish()
    }
}

/// graphql-transport-ws protocol messages.
pub mod protocol {
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    /// Subprotocol negotiated during the upgrade.
    pub const SUBPROTOCOL: &str = "graphql-transport-ws";

    /// Client to server message types.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum ClientMessage {
        /// Initialize connection.
        #[serde(rename = "connection_init")]
        ConnectionInit {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// Start a subscription.
        #[serde(rename = "subscribe")]
        Subscribe {
            id: String,
            payload: SubscribePayload,
        },
        /// Complete a subscription.
        #[serde(rename = "complete")]
        Complete { id: String },
        /// Ping for keep-alive.
        #[serde(rename = "ping")]
        Ping {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// Pong response.
        #[serde(rename = "pong")]
        Pong {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
    }

    /// Subscribe payload; the request body in camelCase.
    pub type SubscribePayload = crate::GraphQLRequest;

    /// Server to client message types.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum ServerMessage {
        /// Connection acknowledged.
        #[serde(rename = "connection_ack")]
        ConnectionAck {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// One execution result.
        #[serde(rename = "next")]
        Next {
            id: String,
            payload: crate::GraphQLResponse<Value>,
        },
        /// Operation failed; no further messages for this id.
        #[serde(rename = "error")]
        Error {
            id: String,
            payload: Vec<crate::GraphQLResponseError>,
        },
        /// Subscription complete.
        #[serde(rename = "complete")]
        Complete { id: String },
        /// Ping from server.
        #[serde(rename = "ping")]
        Ping {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
        /// Pong from server.
        #[serde(rename = "pong")]
        Pong {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            payload: Option<Value>,
        },
    }

    /// `connection_init` payload carrying the bearer token under both key casings.
    pub fn connection_params(token: Option<&str>) -> Value {
        match token {
            Some(token) => {
                let bearer = format!("Bearer {}", token);
                json!({ "Authorization": bearer, "authorization": bearer })
            }
            None => json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::protocol::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_message_shape() {
        let msg = ClientMessage::Subscribe {
            id: "1".to_string(),
            payload: crate::GraphQLRequest::new("subscription { orderStatusChanged { _id } }")
                .operation_name("OrderStatus"),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "subscribe",
                "id": "1",
                "payload": {
                    "query": "subscription { orderStatusChanged { _id } }",
                    "operationName": "OrderStatus"
                }
            })
        );
    }

    #[test]
    fn test_next_payload_is_execution_result() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "next",
            "id": "3",
            "payload": { "data": { "riderLocation": { "lat": 1.5 } }, "errors": [{ "message": "stale" }] }
        }))
        .unwrap();

        match msg {
            ServerMessage::Next { id, payload } => {
                assert_eq!(id, "3");
                assert!(payload.has_errors());
                assert_eq!(payload.data.unwrap()["riderLocation"]["lat"], 1.5);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_connection_params_carry_both_casings() {
        let params = connection_params(Some("abc"));
        assert_eq!(params["Authorization"], "Bearer abc");
        assert_eq!(params["authorization"], "Bearer abc");
        assert_eq!(connection_params(None), json!({}));
    }

    #[test]
    fn test_ping_without_payload() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Ping { payload: None });
        assert_eq!(
            serde_json::to_string(&ClientMessage::Pong { payload: None }).unwrap(),
            r#"{"type":"pong"}"#
        );
    }
}
