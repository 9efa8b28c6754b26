use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Protocol version carried by every message on the wire
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation key of a request, echoed back in the response.
///
/// Ids compare by variant and value, so `Number(1)` never matches
/// `String("1")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "\"{}\"", s),
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// Integer error code of a failed response.
///
/// Any integer is a valid code; the associated constants are the ones this
/// crate produces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i64);

impl ErrorCode {
    pub const CONNECTION_CLOSED: ErrorCode = ErrorCode(-1);
    pub const REQUEST_TIMEOUT: ErrorCode = ErrorCode(-2);
    pub const PARSE_ERROR: ErrorCode = ErrorCode(-32700);
    pub const INVALID_REQUEST: ErrorCode = ErrorCode(-32600);
    pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode(-32601);
    pub const INVALID_PARAMS: ErrorCode = ErrorCode(-32602);
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);

    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        ErrorCode(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `error` member of a failed response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessResponse {
    pub id: RequestId,
    pub result: Value,
}

impl SuccessResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self { id, result }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailResponse {
    pub id: RequestId,
    pub error: ResponseError,
}

impl FailResponse {
    pub fn new(id: RequestId, error: ResponseError) -> Self {
        Self { id, error }
    }
}

/// A single message sent by the calling side
#[derive(Debug, Clone, PartialEq)]
pub enum ClientItem {
    Request(Request),
    Notification(Notification),
}

/// A single message sent by the answering side
#[derive(Debug, Clone, PartialEq)]
pub enum ServerItem {
    Success(SuccessResponse),
    Fail(FailResponse),
}

impl ServerItem {
    pub fn id(&self) -> &RequestId {
        match self {
            ServerItem::Success(r) => &r.id,
            ServerItem::Fail(r) => &r.id,
        }
    }
}

/// Anything a client puts on the wire. A batch holds single items only,
/// so batches cannot nest.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Request(Request),
    Notification(Notification),
    Batch(Vec<ClientItem>),
}

impl ClientMessage {
    /// Flatten into the single messages this value carries, in order
    pub fn into_items(self) -> Vec<ClientItem> {
        match self {
            ClientMessage::Request(r) => vec![ClientItem::Request(r)],
            ClientMessage::Notification(n) => vec![ClientItem::Notification(n)],
            ClientMessage::Batch(items) => items,
        }
    }
}

impl From<ClientItem> for ClientMessage {
    fn from(item: ClientItem) -> Self {
        match item {
            ClientItem::Request(r) => ClientMessage::Request(r),
            ClientItem::Notification(n) => ClientMessage::Notification(n),
        }
    }
}

impl From<Request> for ClientMessage {
    fn from(r: Request) -> Self {
        ClientMessage::Request(r)
    }
}

impl From<Notification> for ClientMessage {
    fn from(n: Notification) -> Self {
        ClientMessage::Notification(n)
    }
}

/// Anything a server puts on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Success(SuccessResponse),
    Fail(FailResponse),
    Batch(Vec<ServerItem>),
}

impl ServerMessage {
    pub fn into_items(self) -> Vec<ServerItem> {
        match self {
            ServerMessage::Success(r) => vec![ServerItem::Success(r)],
            ServerMessage::Fail(r) => vec![ServerItem::Fail(r)],
            ServerMessage::Batch(items) => items,
        }
    }
}

impl From<ServerItem> for ServerMessage {
    fn from(item: ServerItem) -> Self {
        match item {
            ServerItem::Success(r) => ServerMessage::Success(r),
            ServerItem::Fail(r) => ServerMessage::Fail(r),
        }
    }
}

impl From<SuccessResponse> for ServerMessage {
    fn from(r: SuccessResponse) -> Self {
        ServerMessage::Success(r)
    }
}

impl From<FailResponse> for ServerMessage {
    fn from(r: FailResponse) -> Self {
        ServerMessage::Fail(r)
    }
}

/// Any JSON-RPC 2.0 message, in either direction
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Client(ClientMessage),
    Server(ServerMessage),
}

impl From<ClientMessage> for JsonRpcMessage {
    fn from(m: ClientMessage) -> Self {
        JsonRpcMessage::Client(m)
    }
}

impl From<ServerMessage> for JsonRpcMessage {
    fn from(m: ServerMessage) -> Self {
        JsonRpcMessage::Server(m)
    }
}
