use anyhow::{Context, Result};
use rpc_core::Config;
use rpc_runtime::{ClientBuilder, ServerBuilder};
use rpc_transport::stdio::{lines, stdio};
use rpc_transport::ClientTransport;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::methods::builtin_router;

/// Serve the built-in methods on stdin/stdout until stdin closes or the
/// process is interrupted
pub async fn serve(config: &Config) -> Result<()> {
    let transport = stdio(&config.transport).into_jsonrpc().server();
    let server = ServerBuilder::new(transport)
        .with_config(&config.server)
        .router(&builtin_router())
        .build();
    server.start();
    info!("Serving on stdio");

    tokio::select! {
        _ = server.wait() => debug!("Input closed"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Interrupted"),
            Err(e) => warn!("Failed to listen for interrupt: {}", e),
        },
    }

    server.close().await;
    info!("Server stopped");
    Ok(())
}

/// Spawn `command`, call `method` on it over its stdin/stdout and return
/// the result
pub async fn call(
    config: &Config,
    method: &str,
    params: Option<Value>,
    timeout: Option<Duration>,
    command: &[String],
) -> Result<Value> {
    let (program, args) = command
        .split_first()
        .context("No command given to call")?;

    debug!("Spawning {} {:?}", program, args);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {}", program))?;

    let stdin = child.stdin.take().context("Child stdin not captured")?;
    let stdout = child.stdout.take().context("Child stdout not captured")?;
    let transport = lines(stdout, stdin, &config.transport).into_jsonrpc().client();

    let result = call_over(transport, config, method, params, timeout).await;

    if let Err(e) = child.kill().await {
        debug!("Child already gone: {}", e);
    }
    result
}

/// Call `method` once over an existing transport, then close it
pub async fn call_over(
    transport: ClientTransport,
    config: &Config,
    method: &str,
    params: Option<Value>,
    timeout: Option<Duration>,
) -> Result<Value> {
    let mut builder = ClientBuilder::new(transport).with_config(&config.client);
    if let Some(timeout) = timeout {
        builder = builder.request_timeout(timeout);
    }
    let client = builder.build();

    let result = client.request(method, params).await;
    client.close().await;
    result.with_context(|| format!("Call to {} failed", method))
}
