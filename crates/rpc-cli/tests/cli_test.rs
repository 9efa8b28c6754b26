use rpc_cli::{builtin_router, call_over};
use rpc_core::{Config, Error, ErrorCode};
use rpc_runtime::{ClientBuilder, ServerBuilder};
use rpc_transport::memory;
use serde_json::json;
use std::time::Duration;

fn start_builtin_server() -> rpc_transport::ClientTransport {
    let (near, far) = memory::pair(16);
    let server = ServerBuilder::new(far.into_jsonrpc().server())
        .router(&builtin_router())
        .build();
    server.start();
    near.into_jsonrpc().client()
}

#[tokio::test]
async fn test_call_over_builtin_methods() {
    let config = Config::default();

    // Each call gets its own connection since call_over closes it
    let pong = call_over(start_builtin_server(), &config, "ping", None, None).await.unwrap();
    assert_eq!(pong, json!("pong"));

    let total = call_over(start_builtin_server(), &config, "sum", Some(json!([1, 2, 39])), None)
        .await
        .unwrap();
    assert_eq!(total, json!(42));
}

#[tokio::test]
async fn test_call_over_reports_remote_errors() {
    let config = Config::default();

    let error = call_over(start_builtin_server(), &config, "sum", Some(json!("x")), None)
        .await
        .unwrap_err();
    match error.downcast_ref::<Error>() {
        Some(Error::Remote(remote)) => assert_eq!(remote.code, ErrorCode::INVALID_PARAMS),
        other => panic!("expected a remote error, got {:?}", other),
    }

    let error = call_over(start_builtin_server(), &config, "nope", None, Some(Duration::from_secs(1)))
        .await
        .unwrap_err();
    assert!(format!("{:#}", error).contains("Method not found"));
}

#[tokio::test]
async fn test_log_notification_gets_no_response() {
    let client = ClientBuilder::new(start_builtin_server()).build();

    client.notify("log", Some(json!("hello"))).await.unwrap();
    assert_eq!(client.request("echo", Some(json!([1]))).await.unwrap(), json!([1]));
    assert_eq!(client.pending_count(), 0);
    client.close().await;
}
