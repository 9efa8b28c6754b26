//! Client engine: sends requests and notifications, correlates responses
//! by id.

mod pending;

use futures::StreamExt;
use rpc_core::config::ClientConfig;
use rpc_core::{
    ClientItem, ClientMessage, Error, Notification, Request, RequestId, Result, ServerItem,
    ServerMessage, SuccessResponse,
};
use rpc_transport::{ClientTransport, Inbound, OutboundSink};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use self::pending::PendingCalls;
use crate::func::{error_handler, ErrorHandler, Func, NotificationFn, RequestFn};
use crate::intercept::{Chain, Interceptor, Timeout};

/// Configures a [`ClientEngine`]. Interceptors are applied in the order
/// they are added, so the last one added is outermost.
pub struct ClientBuilder {
    transport: ClientTransport,
    request_timeout: Option<Duration>,
    error_handler: Option<ErrorHandler>,
    transport_chain: Chain<ClientTransport>,
    request_chain: Chain<RequestFn>,
    notification_chain: Chain<NotificationFn>,
    error_chain: Chain<ErrorHandler>,
}

impl ClientBuilder {
    pub fn new(transport: ClientTransport) -> Self {
        Self {
            transport,
            request_timeout: None,
            error_handler: None,
            transport_chain: Chain::default(),
            request_chain: Chain::default(),
            notification_chain: Chain::default(),
            error_chain: Chain::default(),
        }
    }

    pub fn with_config(mut self, config: &ClientConfig) -> Self {
        self.request_timeout = config.request_timeout();
        self
    }

    /// Deadline applied to every request, innermost of all interceptors
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Receives unknown responses, inbound decode failures and other errors
    /// no caller is waiting for. Defaults to a warning in the log.
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn intercept_transport(mut self, interceptor: impl Interceptor<ClientTransport> + 'static) -> Self {
        self.transport_chain.push(interceptor);
        self
    }

    pub fn intercept_request(mut self, interceptor: impl Interceptor<RequestFn> + 'static) -> Self {
        self.request_chain.push(interceptor);
        self
    }

    pub fn intercept_notification(mut self, interceptor: impl Interceptor<NotificationFn> + 'static) -> Self {
        self.notification_chain.push(interceptor);
        self
    }

    pub fn intercept_error(mut self, interceptor: impl Interceptor<ErrorHandler> + 'static) -> Self {
        self.error_chain.push(interceptor);
        self
    }

    /// Build the engine and start its receive loop. Must be called from
    /// within a Tokio runtime.
    pub fn build(self) -> ClientEngine {
        let transport = self.transport_chain.apply(self.transport);
        let transport_token = transport.token().clone();
        let token = transport_token.child_token();
        let (sink, inbound, _) = transport.into_parts();
        let pending = Arc::new(PendingCalls::default());

        let mut request_fn = send_and_wait(pending.clone(), sink.clone());
        if let Some(timeout) = self.request_timeout {
            request_fn = Timeout::new(timeout).intercept(request_fn);
        }
        let request_fn = self.request_chain.apply(request_fn);
        let notification_fn = self.notification_chain.apply(send_only(sink.clone()));
        let error_fn = self.error_chain.apply(
            self.error_handler
                .unwrap_or_else(|| error_handler(|e| warn!("Unhandled client error: {}", e))),
        );

        let receive_loop = tokio::spawn(receive_loop(
            inbound,
            pending.clone(),
            error_fn.clone(),
            token.clone(),
        ));
        debug!(
            "Client engine started (request timeout: {:?})",
            self.request_timeout
        );

        ClientEngine {
            inner: Arc::new(ClientInner {
                pending,
                sink,
                request_fn,
                notification_fn,
                request_timeout: self.request_timeout,
                token,
                transport_token,
                next_id: AtomicI64::new(1),
                receive_loop: Mutex::new(Some(receive_loop)),
            }),
        }
    }
}

/// Handle to a running client. Clones share the same engine.
#[derive(Clone)]
pub struct ClientEngine {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    pending: Arc<PendingCalls>,
    sink: OutboundSink<ClientMessage>,
    request_fn: RequestFn,
    notification_fn: NotificationFn,
    request_timeout: Option<Duration>,
    token: CancellationToken,
    transport_token: CancellationToken,
    next_id: AtomicI64,
    receive_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl ClientEngine {
    pub fn builder(transport: ClientTransport) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// Send `request` and wait for the response with the same id.
    ///
    /// A failed response comes back as [`Error::Remote`]. Dropping the
    /// returned future abandons the call and frees its id.
    pub async fn send_request(&self, request: Request) -> Result<SuccessResponse> {
        self.ensure_open()?;
        self.inner.request_fn.call(request).await
    }

    /// Like [`send_request`](Self::send_request) with a deadline for this
    /// call only
    pub async fn send_request_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<SuccessResponse> {
        self.ensure_open()?;
        Timeout::new(timeout)
            .intercept(self.inner.request_fn.clone())
            .call(request)
            .await
    }

    /// Resolves once the transport has taken the notification
    pub async fn send_notification(&self, notification: Notification) -> Result<()> {
        self.ensure_open()?;
        self.inner.notification_fn.call(notification).await
    }

    /// Call `method` under the next free numeric id and return the result
    pub async fn request(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self.send_request(Request::new(id, method, params)).await?;
        Ok(response.result)
    }

    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        self.send_notification(Notification::new(method, params)).await
    }

    /// Send several items as one batch. Returns one outcome per request, in
    /// the order the requests appear in `items`.
    ///
    /// Batches bypass the request and notification interceptors. The
    /// engine's request timeout still applies, counted from the moment the
    /// batch is written.
    pub async fn send_batch(&self, items: Vec<ClientItem>) -> Result<Vec<Result<SuccessResponse>>> {
        self.ensure_open()?;
        let pending = &self.inner.pending;

        let mut calls = Vec::new();
        let mut entries = Vec::new();
        for item in &items {
            if let ClientItem::Request(request) = item {
                let (serial, resolution) = pending.register(request.id.clone())?;
                entries.push(scopeguard::guard(
                    (request.id.clone(), serial),
                    move |(id, serial)| pending.remove(&id, serial),
                ));
                calls.push((request.clone(), resolution));
            }
        }

        trace!("Sending batch of {} item(s)", items.len());
        self.inner
            .sink
            .send(ClientMessage::Batch(items))
            .await
            .map_err(in_flight_failure)?;

        let deadline = self
            .inner
            .request_timeout
            .map(|timeout| (tokio::time::Instant::now() + timeout, timeout));
        let mut results = Vec::with_capacity(calls.len());
        for (request, resolution) in calls {
            let outcome = match deadline {
                Some((at, timeout)) => match tokio::time::timeout_at(at, resolution).await {
                    Ok(resolved) => resolved.unwrap_or(Err(Error::ConnectionClosed)),
                    Err(_) => Err(Error::timeout(Some(request), timeout)),
                },
                None => resolution.await.unwrap_or(Err(Error::ConnectionClosed)),
            };
            results.push(outcome);
        }
        Ok(results)
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Shut the engine and its transport down. Outstanding calls fail with
    /// [`Error::ConnectionClosed`]; later calls fail with [`Error::Closed`].
    pub async fn close(&self) {
        self.inner.token.cancel();
        self.inner.transport_token.cancel();
        self.inner.pending.fail_all(Error::ConnectionClosed);

        let receive_loop = self
            .inner
            .receive_loop
            .lock()
            .ok()
            .and_then(|mut handle| handle.take());
        if let Some(handle) = receive_loop {
            if let Err(e) = handle.await {
                warn!("Client receive loop ended abnormally: {}", e);
            }
        }
        debug!("Client engine closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

/// The innermost request function: register, write, wait
fn send_and_wait(pending: Arc<PendingCalls>, sink: OutboundSink<ClientMessage>) -> RequestFn {
    Func::new(move |request: Request| {
        let pending = pending.clone();
        let sink = sink.clone();
        async move {
            let id = request.id.clone();
            let (serial, resolution) = pending.register(id.clone())?;
            // Runs on every exit, including when the caller stops waiting
            let _entry = scopeguard::guard((), |_| pending.remove(&id, serial));

            trace!("Sending request {} ({})", id, request.method);
            sink.send(ClientMessage::Request(request))
                .await
                .map_err(in_flight_failure)?;
            resolution.await.unwrap_or(Err(Error::ConnectionClosed))
        }
    })
}

/// A registered call whose write was cut off by shutdown lost its
/// connection; other write failures pass through unchanged.
fn in_flight_failure(error: Error) -> Error {
    match error {
        Error::Closed => Error::ConnectionClosed,
        other => other,
    }
}

fn send_only(sink: OutboundSink<ClientMessage>) -> NotificationFn {
    Func::new(move |notification: Notification| {
        let sink = sink.clone();
        async move {
            trace!("Sending notification {}", notification.method);
            sink.send(ClientMessage::Notification(notification)).await
        }
    })
}

async fn receive_loop(
    mut inbound: Inbound<ServerMessage>,
    pending: Arc<PendingCalls>,
    errors: ErrorHandler,
    token: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = token.cancelled() => break,
            item = inbound.next() => item,
        };
        match item {
            Some(Ok(message)) => {
                for item in message.into_items() {
                    deliver(&pending, &errors, item);
                }
            }
            Some(Err(e)) => report(&errors, e),
            None => {
                info!("Inbound stream ended, closing client engine");
                break;
            }
        }
    }

    token.cancel();
    pending.fail_all(Error::ConnectionClosed);
    debug!("Client receive loop stopped");
}

fn deliver(pending: &PendingCalls, errors: &ErrorHandler, item: ServerItem) {
    let id: RequestId = item.id().clone();
    let result = match item {
        ServerItem::Success(response) => Ok(response),
        ServerItem::Fail(response) => Err(Error::Remote(response.error)),
    };
    if pending.resolve(&id, result) {
        trace!("Resolved call {}", id);
    } else {
        report(errors, Error::UnknownResponse(id));
    }
}

fn report(errors: &ErrorHandler, error: Error) {
    tokio::spawn(errors.call(error));
}
