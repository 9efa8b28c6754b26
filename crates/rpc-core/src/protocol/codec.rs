//! Shape-driven JSON codec for JSON-RPC 2.0 messages.
//!
//! The wire format has no type tag, so decoding looks at which keys are
//! present:
//! - an array is a batch; its first element decides whether it is a client
//!   batch (has `method`) or a server batch
//! - an object with `method` is a request (has `id`) or a notification
//! - an object without `method` is a success (has `result`) or a failure
//!   (has `error`)
//!
//! Every malformed payload comes back as a [`DecodeError`]; nothing here
//! panics or drops input silently.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::trace;

use super::message::{
    ClientItem, ClientMessage, ErrorCode, FailResponse, JsonRpcMessage, Notification, Request,
    RequestId, ResponseError, ServerItem, ServerMessage, SuccessResponse, JSONRPC_VERSION,
};
use super::DecodeError;

/// Decode a message from its textual form
pub fn decode_str(text: &str) -> Result<JsonRpcMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Parse(e.to_string()))?;
    decode_value(value)
}

/// Decode a message from an already parsed JSON element
pub fn decode_value(value: Value) -> Result<JsonRpcMessage, DecodeError> {
    match value {
        Value::Array(items) => decode_batch(items),
        Value::Object(map) => {
            if map.contains_key("method") {
                decode_client_item(map).map(|item| JsonRpcMessage::Client(item.into()))
            } else {
                decode_server_item(map).map(|item| JsonRpcMessage::Server(item.into()))
            }
        }
        other => Err(DecodeError::Invalid(format!(
            "expected an object or an array, found {}",
            json_kind(&other)
        ))),
    }
}

/// Encode a message to its canonical JSON element
pub fn encode_value(message: &JsonRpcMessage) -> Value {
    match message {
        JsonRpcMessage::Client(m) => encode_client(m),
        JsonRpcMessage::Server(m) => encode_server(m),
    }
}

/// Encode a message to compact JSON text
pub fn encode_string(message: &JsonRpcMessage) -> String {
    encode_value(message).to_string()
}

pub fn encode_client(message: &ClientMessage) -> Value {
    match message {
        ClientMessage::Request(r) => encode_request(r),
        ClientMessage::Notification(n) => encode_notification(n),
        ClientMessage::Batch(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    ClientItem::Request(r) => encode_request(r),
                    ClientItem::Notification(n) => encode_notification(n),
                })
                .collect(),
        ),
    }
}

pub fn encode_server(message: &ServerMessage) -> Value {
    match message {
        ServerMessage::Success(r) => encode_success(r),
        ServerMessage::Fail(r) => encode_fail(r),
        ServerMessage::Batch(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    ServerItem::Success(r) => encode_success(r),
                    ServerItem::Fail(r) => encode_fail(r),
                })
                .collect(),
        ),
    }
}

fn envelope() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "jsonrpc".to_string(),
        Value::String(JSONRPC_VERSION.to_string()),
    );
    map
}

fn encode_request(request: &Request) -> Value {
    let mut map = envelope();
    map.insert("id".to_string(), encode_id(&request.id));
    map.insert("method".to_string(), Value::String(request.method.clone()));
    if let Some(params) = &request.params {
        map.insert("params".to_string(), params.clone());
    }
    Value::Object(map)
}

fn encode_notification(notification: &Notification) -> Value {
    let mut map = envelope();
    map.insert(
        "method".to_string(),
        Value::String(notification.method.clone()),
    );
    if let Some(params) = &notification.params {
        map.insert("params".to_string(), params.clone());
    }
    Value::Object(map)
}

fn encode_success(response: &SuccessResponse) -> Value {
    let mut map = envelope();
    map.insert("id".to_string(), encode_id(&response.id));
    map.insert("result".to_string(), response.result.clone());
    Value::Object(map)
}

fn encode_fail(response: &FailResponse) -> Value {
    let mut map = envelope();
    map.insert("id".to_string(), encode_id(&response.id));

    let mut error = Map::new();
    error.insert("code".to_string(), Value::from(response.error.code.0));
    error.insert(
        "message".to_string(),
        Value::String(response.error.message.clone()),
    );
    if let Some(data) = &response.error.data {
        error.insert("data".to_string(), data.clone());
    }
    map.insert("error".to_string(), Value::Object(error));
    Value::Object(map)
}

fn encode_id(id: &RequestId) -> Value {
    match id {
        RequestId::String(s) => Value::String(s.clone()),
        RequestId::Number(n) => Value::from(*n),
        RequestId::Null => Value::Null,
    }
}

fn decode_batch(items: Vec<Value>) -> Result<JsonRpcMessage, DecodeError> {
    // An empty array carries nothing to discriminate on; it is read as an
    // empty client batch.
    let client_batch = match items.first() {
        None => true,
        Some(Value::Object(first)) => first.contains_key("method"),
        Some(_) => false,
    };
    trace!(
        "Decoding {} batch of {} element(s)",
        if client_batch { "client" } else { "server" },
        items.len()
    );

    if client_batch {
        let decoded = items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) if map.contains_key("method") => decode_client_item(map),
                Value::Object(_) => Err(DecodeError::Invalid(
                    "response found inside a client batch".to_string(),
                )),
                Value::Array(_) => Err(DecodeError::Invalid("nested batch".to_string())),
                other => Err(DecodeError::Invalid(format!(
                    "batch element must be an object, found {}",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonRpcMessage::Client(ClientMessage::Batch(decoded)))
    } else {
        let decoded = items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) if map.contains_key("method") => Err(DecodeError::Invalid(
                    "request found inside a server batch".to_string(),
                )),
                Value::Object(map) => decode_server_item(map),
                Value::Array(_) => Err(DecodeError::Invalid("nested batch".to_string())),
                other => Err(DecodeError::Invalid(format!(
                    "batch element must be an object, found {}",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonRpcMessage::Server(ServerMessage::Batch(decoded)))
    }
}

fn decode_client_item(mut map: Map<String, Value>) -> Result<ClientItem, DecodeError> {
    check_version(&map)?;

    let method = match map.remove("method") {
        Some(Value::String(method)) => method,
        Some(other) => {
            return Err(DecodeError::Invalid(format!(
                "method must be a string, found {}",
                json_kind(&other)
            )))
        }
        None => return Err(DecodeError::Invalid("missing method".to_string())),
    };
    let params = map.remove("params");

    match map.remove("id") {
        Some(id) => Ok(ClientItem::Request(Request {
            id: decode_id(id)?,
            method,
            params,
        })),
        None => Ok(ClientItem::Notification(Notification { method, params })),
    }
}

fn decode_server_item(mut map: Map<String, Value>) -> Result<ServerItem, DecodeError> {
    check_version(&map)?;

    let id = match map.remove("id") {
        Some(id) => decode_id(id)?,
        None => RequestId::Null,
    };

    if let Some(result) = map.remove("result") {
        return Ok(ServerItem::Success(SuccessResponse { id, result }));
    }
    if let Some(error) = map.remove("error") {
        return Ok(ServerItem::Fail(FailResponse {
            id,
            error: decode_error_object(error)?,
        }));
    }

    Err(DecodeError::Invalid(
        "message has none of method, result or error".to_string(),
    ))
}

fn decode_error_object(value: Value) -> Result<ResponseError, DecodeError> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeError::Invalid(format!(
                "error must be an object, found {}",
                json_kind(&other)
            )))
        }
    };

    let code = map
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| DecodeError::Invalid("error code must be an integer".to_string()))?;
    let message = match map.remove("message") {
        Some(Value::String(message)) => message,
        _ => {
            return Err(DecodeError::Invalid(
                "error message must be a string".to_string(),
            ))
        }
    };

    Ok(ResponseError {
        code: ErrorCode(code),
        message,
        data: map.remove("data"),
    })
}

fn decode_id(value: Value) -> Result<RequestId, DecodeError> {
    match value {
        Value::String(s) => Ok(RequestId::String(s)),
        Value::Null => Ok(RequestId::Null),
        Value::Number(n) => n
            .as_i64()
            .map(RequestId::Number)
            .ok_or_else(|| DecodeError::Invalid(format!("id {} is not a 64-bit integer", n))),
        other => Err(DecodeError::Invalid(format!(
            "id must be a string, number or null, found {}",
            json_kind(&other)
        ))),
    }
}

fn check_version(map: &Map<String, Value>) -> Result<(), DecodeError> {
    match map.get("jsonrpc") {
        None => Ok(()),
        Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(()),
        Some(other) => Err(DecodeError::Invalid(format!(
            "unsupported jsonrpc version {}",
            other
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_id(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode_id(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_client(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonRpcMessage::deserialize(deserializer)? {
            JsonRpcMessage::Client(message) => Ok(message),
            JsonRpcMessage::Server(_) => Err(serde::de::Error::custom(
                "expected a request, notification or client batch",
            )),
        }
    }
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_server(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonRpcMessage::deserialize(deserializer)? {
            JsonRpcMessage::Server(message) => Ok(message),
            JsonRpcMessage::Client(_) => Err(serde::de::Error::custom(
                "expected a response or server batch",
            )),
        }
    }
}
