use futures::future::ready;
use futures::stream::BoxStream;
use futures::StreamExt;
use rpc_core::protocol::{decode_value, encode_value};
use rpc_core::{ClientMessage, DecodeError, Error, JsonRpcMessage, Result, ServerMessage};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::shared::SharedInbound;
use crate::sink::OutboundSink;

/// Inbound half of a transport. Every failure, decode failures included,
/// is an item of its own; the stream only ends when the connection does.
pub type Inbound<T> = BoxStream<'static, Result<T>>;

pub const DEFAULT_CAPACITY: usize = 64;

/// A closable, typed, bidirectional conduit.
///
/// `In` is what this side writes, `Out` what it reads. Cancelling the token
/// tears down both directions.
pub struct Transport<In, Out> {
    sink: OutboundSink<In>,
    inbound: Inbound<Out>,
    token: CancellationToken,
    capacity: usize,
}

/// Writes requests and notifications, reads responses.
///
/// Inbound requests and notifications are not errors on this view: they are
/// skipped with a debug log, since a [`Transport::peer`] connection hands
/// them to the server view instead. A client-only connection whose peer
/// sends requests therefore never sees them.
pub type ClientTransport = Transport<ClientMessage, ServerMessage>;

/// Reads requests and notifications, writes responses. Inbound responses are
/// skipped the same way [`ClientTransport`] skips requests.
pub type ServerTransport = Transport<ServerMessage, ClientMessage>;

impl<In: Send + 'static, Out: Send + 'static> Transport<In, Out> {
    pub fn new(
        sink: OutboundSink<In>,
        inbound: Inbound<Out>,
        token: CancellationToken,
        capacity: usize,
    ) -> Self {
        Self {
            sink,
            inbound,
            token,
            capacity,
        }
    }

    pub fn sink(&self) -> &OutboundSink<In> {
        &self.sink
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn into_parts(self) -> (OutboundSink<In>, Inbound<Out>, CancellationToken) {
        (self.sink, self.inbound, self.token)
    }

    /// Tear down both directions
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Build a transport of another shape on top of this one.
    ///
    /// Outbound values go through `outbound` on a forwarding task; inbound
    /// items go through `inbound`, which may drop an item by returning
    /// `None`.
    pub fn map<In2, Out2, F, G>(self, outbound: F, mut inbound: G) -> Transport<In2, Out2>
    where
        In2: Send + 'static,
        Out2: Send + 'static,
        F: Fn(In2) -> Result<In> + Send + 'static,
        G: FnMut(Result<Out>) -> Option<Result<Out2>> + Send + 'static,
    {
        let sink = self
            .sink
            .forward(self.token.clone(), self.capacity, outbound);
        let inbound = self
            .inbound
            .filter_map(move |item| ready(inbound(item)))
            .boxed();
        Transport::new(sink, inbound, self.token, self.capacity)
    }
}

impl Transport<String, String> {
    /// Parse inbound text as JSON and serialize outbound JSON
    pub fn json(self) -> Transport<Value, Value> {
        self.map(
            |value: Value| Ok(value.to_string()),
            |item: Result<String>| {
                Some(item.and_then(|text| {
                    serde_json::from_str(&text)
                        .map_err(|e| Error::Decode(DecodeError::Parse(e.to_string())))
                }))
            },
        )
    }

    /// Shorthand for `json().jsonrpc()`
    pub fn into_jsonrpc(self) -> Transport<JsonRpcMessage, JsonRpcMessage> {
        self.json().jsonrpc()
    }
}

impl Transport<Value, Value> {
    /// Decode inbound JSON into messages and encode outbound messages
    pub fn jsonrpc(self) -> Transport<JsonRpcMessage, JsonRpcMessage> {
        self.map(
            |message: JsonRpcMessage| Ok(encode_value(&message)),
            |item: Result<Value>| Some(item.and_then(|value| decode_value(value).map_err(Error::from))),
        )
    }
}

impl Transport<JsonRpcMessage, JsonRpcMessage> {
    /// Narrow to the calling side. Inbound requests and notifications are
    /// dropped from the stream; decode failures still come through.
    pub fn client(self) -> ClientTransport {
        self.map(
            |message: ClientMessage| Ok(JsonRpcMessage::Client(message)),
            |item| match item {
                Ok(JsonRpcMessage::Server(message)) => Some(Ok(message)),
                Ok(JsonRpcMessage::Client(message)) => {
                    debug!("Client view skipping inbound {:?}", message);
                    None
                }
                Err(e) => Some(Err(e)),
            },
        )
    }

    /// Narrow to the answering side. Inbound responses are dropped from the
    /// stream; decode failures still come through.
    pub fn server(self) -> ServerTransport {
        self.map(
            |message: ServerMessage| Ok(JsonRpcMessage::Server(message)),
            |item| match item {
                Ok(JsonRpcMessage::Client(message)) => Some(Ok(message)),
                Ok(JsonRpcMessage::Server(message)) => {
                    debug!("Server view skipping inbound {:?}", message);
                    None
                }
                Err(e) => Some(Err(e)),
            },
        )
    }

    /// Split one connection into a client view and a server view that share
    /// the outbound sink and see every inbound item.
    ///
    /// `replay` items are replayed to views that subscribe late; both views
    /// returned here subscribe before any item is read.
    pub fn peer(self, replay: usize) -> (ClientTransport, ServerTransport) {
        let capacity = self.capacity;
        let (sink, inbound, token) = self.into_parts();

        let shared = SharedInbound::new(inbound, replay);
        let client = Transport::new(sink.clone(), shared.subscribe(), token.clone(), capacity);
        let server = Transport::new(sink, shared.subscribe(), token, capacity);
        shared.start();

        (client.client(), server.server())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory;
    use rpc_core::ClientItem;
    use serde_json::json;

    #[tokio::test]
    async fn test_client_view_skips_requests_and_keeps_reading() {
        let (near, far) = memory::pair(8);
        let (_sink, mut inbound, _token) = near.into_jsonrpc().client().into_parts();
        let (far_sink, _far_inbound, _far_token) = far.into_parts();

        far_sink
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
            .await
            .unwrap();
        far_sink.send("not json".to_string()).await.unwrap();
        far_sink
            .send(r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#.to_string())
            .await
            .unwrap();

        assert!(matches!(
            inbound.next().await,
            Some(Err(Error::Decode(DecodeError::Parse(_))))
        ));
        match inbound.next().await {
            Some(Ok(ServerMessage::Success(response))) => assert_eq!(response.result, json!("pong")),
            other => panic!("expected the response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peer_views_each_see_their_own_side() {
        let (near, far) = memory::pair(8);
        let (client, server) = near.into_jsonrpc().peer(0);
        let (_client_sink, mut client_in, _) = client.into_parts();
        let (_server_sink, mut server_in, _) = server.into_parts();
        let (far_sink, _far_inbound, _far_token) = far.into_parts();

        far_sink
            .send(r#"{"jsonrpc":"2.0","id":"s1","method":"ping"}"#.to_string())
            .await
            .unwrap();
        far_sink
            .send(r#"{"jsonrpc":"2.0","id":7,"result":true}"#.to_string())
            .await
            .unwrap();

        match server_in.next().await {
            Some(Ok(message)) => match message.into_items().as_slice() {
                [ClientItem::Request(request)] => assert_eq!(request.method, "ping"),
                other => panic!("expected one request, got {:?}", other),
            },
            other => panic!("expected a request, got {:?}", other),
        }
        match client_in.next().await {
            Some(Ok(message)) => assert_eq!(message.into_items()[0].id(), &rpc_core::RequestId::Number(7)),
            other => panic!("expected a response, got {:?}", other),
        }
    }
}
