use crate::protocol::{
    decode_str, decode_value, encode_string, encode_value, ClientItem, ClientMessage,
    DecodeError, ErrorCode, FailResponse, JsonRpcMessage, Notification, Request, RequestId,
    ResponseError, ServerItem, ServerMessage, SuccessResponse,
};
use serde_json::{json, Value};

fn round_trip(message: JsonRpcMessage) {
    let text = encode_string(&message);
    let decoded = decode_str(&text).expect("encoded message should decode");
    assert_eq!(decoded, message, "round trip changed message: {}", text);
}

fn sample_ids() -> Vec<RequestId> {
    vec![
        RequestId::Number(7),
        RequestId::Number(-3),
        RequestId::String("abc".to_string()),
        RequestId::String("1".to_string()),
        RequestId::Null,
    ]
}

#[test]
fn test_round_trip_every_single_variant() {
    for id in sample_ids() {
        round_trip(JsonRpcMessage::Client(ClientMessage::Request(Request::new(
            id.clone(),
            "tools/list",
            Some(json!({"cursor": null})),
        ))));
        round_trip(JsonRpcMessage::Server(ServerMessage::Success(
            SuccessResponse::new(id.clone(), json!([1, 2, 3])),
        )));
        round_trip(JsonRpcMessage::Server(ServerMessage::Fail(FailResponse::new(
            id,
            ResponseError::new(ErrorCode(42), "custom").with_data(json!({"why": "because"})),
        ))));
    }
    round_trip(JsonRpcMessage::Client(ClientMessage::Notification(
        Notification::new("progress", None),
    )));
}

#[test]
fn test_round_trip_preserves_present_null_members() {
    round_trip(JsonRpcMessage::Client(ClientMessage::Request(Request::new(
        1,
        "m",
        Some(Value::Null),
    ))));
    round_trip(JsonRpcMessage::Server(ServerMessage::Success(
        SuccessResponse::new(RequestId::Number(1), Value::Null),
    )));
    round_trip(JsonRpcMessage::Server(ServerMessage::Fail(FailResponse::new(
        RequestId::Number(1),
        ResponseError::new(ErrorCode::INTERNAL_ERROR, "boom").with_data(Value::Null),
    ))));
}

#[test]
fn test_round_trip_batches() {
    round_trip(JsonRpcMessage::Client(ClientMessage::Batch(vec![
        ClientItem::Request(Request::new(1, "a", None)),
        ClientItem::Notification(Notification::new("b", Some(json!([true])))),
        ClientItem::Request(Request::new("x", "c", Some(json!({})))),
    ])));
    round_trip(JsonRpcMessage::Server(ServerMessage::Batch(vec![
        ServerItem::Success(SuccessResponse::new(RequestId::Number(1), json!("ok"))),
        ServerItem::Fail(FailResponse::new(
            RequestId::Null,
            ResponseError::method_not_found("c"),
        )),
    ])));
}

#[test]
fn test_encode_always_writes_version_and_omits_absent_params() {
    let value = encode_value(&JsonRpcMessage::Client(ClientMessage::Notification(
        Notification::new("ping", None),
    )));
    assert_eq!(value, json!({"jsonrpc": "2.0", "method": "ping"}));
}

#[test]
fn test_decode_discriminates_by_shape() {
    let request = decode_str(r#"{"jsonrpc":"2.0","id":1,"method":"m"}"#).unwrap();
    assert!(matches!(
        request,
        JsonRpcMessage::Client(ClientMessage::Request(ref r)) if r.id == RequestId::Number(1)
    ));

    let notification = decode_str(r#"{"jsonrpc":"2.0","method":"m","params":[1]}"#).unwrap();
    assert!(matches!(
        notification,
        JsonRpcMessage::Client(ClientMessage::Notification(_))
    ));

    let success = decode_str(r#"{"jsonrpc":"2.0","id":"a","result":null}"#).unwrap();
    assert!(matches!(
        success,
        JsonRpcMessage::Server(ServerMessage::Success(ref r)) if r.result.is_null()
    ));

    let fail =
        decode_str(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32601,"message":"nope"}}"#)
            .unwrap();
    match fail {
        JsonRpcMessage::Server(ServerMessage::Fail(r)) => {
            assert_eq!(r.id, RequestId::Null);
            assert_eq!(r.error.code, ErrorCode::METHOD_NOT_FOUND);
            assert_eq!(r.error.data, None);
        }
        other => panic!("Expected a failed response, got {:?}", other),
    }
}

#[test]
fn test_null_id_is_a_request_not_a_notification() {
    let decoded = decode_str(r#"{"jsonrpc":"2.0","id":null,"method":"m"}"#).unwrap();
    match decoded {
        JsonRpcMessage::Client(ClientMessage::Request(r)) => assert_eq!(r.id, RequestId::Null),
        other => panic!("Expected a request, got {:?}", other),
    }
}

#[test]
fn test_batch_side_follows_first_element() {
    let client = decode_str(r#"[{"method":"a"},{"id":2,"method":"b"}]"#).unwrap();
    match client {
        JsonRpcMessage::Client(ClientMessage::Batch(items)) => assert_eq!(items.len(), 2),
        other => panic!("Expected a client batch, got {:?}", other),
    }

    let server = decode_str(r#"[{"id":1,"result":1},{"id":2,"error":{"code":1,"message":"x"}}]"#)
        .unwrap();
    match server {
        JsonRpcMessage::Server(ServerMessage::Batch(items)) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].id(), &RequestId::Number(2));
        }
        other => panic!("Expected a server batch, got {:?}", other),
    }
}

#[test]
fn test_empty_array_reads_as_empty_client_batch() {
    let decoded = decode_str("[]").unwrap();
    assert_eq!(
        decoded,
        JsonRpcMessage::Client(ClientMessage::Batch(Vec::new()))
    );
}

#[test]
fn test_decode_failures_are_values() {
    assert!(matches!(decode_str("{not json"), Err(DecodeError::Parse(_))));

    let invalid = [
        r#"{"jsonrpc":"2.0","id":1}"#,
        r#"42"#,
        r#""hello""#,
        r#"{"method":7}"#,
        r#"{"id":1.5,"method":"m"}"#,
        r#"{"id":{"a":1},"result":1}"#,
        r#"{"jsonrpc":"1.0","method":"m"}"#,
        r#"{"id":1,"error":"bad"}"#,
        r#"{"id":1,"error":{"code":"x","message":"m"}}"#,
        r#"[{"method":"a"},{"id":1,"result":2}]"#,
        r#"[{"id":1,"result":2},{"method":"a"}]"#,
        r#"[[{"method":"a"}]]"#,
        r#"[1,2]"#,
    ];
    for text in invalid {
        match decode_str(text) {
            Err(DecodeError::Invalid(_)) => {}
            other => panic!("Expected invalid-message failure for {}, got {:?}", text, other),
        }
    }
}

#[test]
fn test_missing_version_is_accepted() {
    let decoded = decode_value(json!({"id": 3, "result": {"ok": true}})).unwrap();
    assert!(matches!(decoded, JsonRpcMessage::Server(ServerMessage::Success(_))));
}

#[test]
fn test_decode_error_codes() {
    assert_eq!(
        DecodeError::Parse("x".into()).code(),
        ErrorCode::PARSE_ERROR
    );
    assert_eq!(
        DecodeError::Invalid("x".into()).code(),
        ErrorCode::INVALID_REQUEST
    );
}

#[test]
fn test_serde_entry_points_use_the_codec() {
    let message: ClientMessage =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":"q","method":"m"}"#).unwrap();
    assert_eq!(message, ClientMessage::Request(Request::new("q", "m", None)));

    let wrong_side: Result<ServerMessage, _> =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":"q","method":"m"}"#);
    assert!(wrong_side.is_err());

    let id: RequestId = serde_json::from_value(json!(12)).unwrap();
    assert_eq!(id, RequestId::Number(12));
    assert_eq!(serde_json::to_value(RequestId::Null).unwrap(), Value::Null);
}
