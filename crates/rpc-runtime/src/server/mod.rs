//! Server engine: dispatches inbound requests and notifications to
//! handlers, each as its own task.

mod router;

pub use router::{method_not_found, MethodFn, NotifyFn, Router};

use futures::future::BoxFuture;
use futures::StreamExt;
use rpc_core::config::ServerConfig;
use rpc_core::{
    ClientItem, ClientMessage, Error, FailResponse, Notification, Request, RequestId,
    ResponseError, Result, ServerMessage,
};
use rpc_transport::{Inbound, OutboundSink, ServerTransport};
use serde_json::json;
use std::any::Any;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::func::{error_handler, ErrorHandler, Func, NotificationHandler, RequestHandler};
use crate::intercept::{Chain, Interceptor};

/// Configures a [`ServerEngine`]. Nothing is read from the transport until
/// [`ServerEngine::start`].
pub struct ServerBuilder {
    transport: ServerTransport,
    request_handler: Option<RequestHandler>,
    notification_handler: Option<NotificationHandler>,
    error_handler: Option<ErrorHandler>,
    max_concurrent_handlers: usize,
    transport_chain: Chain<ServerTransport>,
    request_chain: Chain<RequestHandler>,
    notification_chain: Chain<NotificationHandler>,
    error_chain: Chain<ErrorHandler>,
}

impl ServerBuilder {
    pub fn new(transport: ServerTransport) -> Self {
        Self {
            transport,
            request_handler: None,
            notification_handler: None,
            error_handler: None,
            max_concurrent_handlers: 0,
            transport_chain: Chain::default(),
            request_chain: Chain::default(),
            notification_chain: Chain::default(),
            error_chain: Chain::default(),
        }
    }

    pub fn with_config(mut self, config: &ServerConfig) -> Self {
        self.max_concurrent_handlers = config.max_concurrent_handlers;
        self
    }

    /// Answers every request. Without one, requests get METHOD_NOT_FOUND.
    pub fn request_handler(mut self, handler: RequestHandler) -> Self {
        self.request_handler = Some(handler);
        self
    }

    pub fn notification_handler(mut self, handler: NotificationHandler) -> Self {
        self.notification_handler = Some(handler);
        self
    }

    /// Use `router` for both requests and notifications
    pub fn router(self, router: &Router) -> Self {
        self.request_handler(router.request_handler())
            .notification_handler(router.notification_handler())
    }

    /// Receives handler failures, inbound decode failures and failed
    /// deliveries. Defaults to a warning in the log.
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Upper bound on handlers running at once; 0 means no bound
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.max_concurrent_handlers = limit;
        self
    }

    pub fn intercept_transport(mut self, interceptor: impl Interceptor<ServerTransport> + 'static) -> Self {
        self.transport_chain.push(interceptor);
        self
    }

    pub fn intercept_request(mut self, interceptor: impl Interceptor<RequestHandler> + 'static) -> Self {
        self.request_chain.push(interceptor);
        self
    }

    pub fn intercept_notification(mut self, interceptor: impl Interceptor<NotificationHandler> + 'static) -> Self {
        self.notification_chain.push(interceptor);
        self
    }

    pub fn intercept_error(mut self, interceptor: impl Interceptor<ErrorHandler> + 'static) -> Self {
        self.error_chain.push(interceptor);
        self
    }

    pub fn build(self) -> ServerEngine {
        let transport = self.transport_chain.apply(self.transport);
        let transport_token = transport.token().clone();
        let token = transport_token.child_token();
        let (sink, inbound, _) = transport.into_parts();

        let request_handler = self.request_chain.apply(
            self.request_handler
                .unwrap_or_else(|| Func::new(|request: Request| async move { Ok(method_not_found(request)) })),
        );
        let notification_handler = self.notification_chain.apply(
            self.notification_handler
                .unwrap_or_else(|| {
                    Func::new(|notification: Notification| async move {
                        debug!("Ignoring notification {}", notification.method);
                        Ok(())
                    })
                }),
        );
        let error_handler = self.error_chain.apply(
            self.error_handler
                .unwrap_or_else(|| error_handler(|e| warn!("Server error: {}", e))),
        );
        let limit = match self.max_concurrent_handlers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        ServerEngine {
            inner: Arc::new(ServerInner {
                inbound: Mutex::new(Some(inbound)),
                sink,
                request_handler,
                notification_handler,
                error_handler,
                token,
                transport_token,
                tracker: TaskTracker::new(),
                limit,
            }),
        }
    }
}

/// Handle to a server. Clones share the same engine.
#[derive(Clone)]
pub struct ServerEngine {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    inbound: Mutex<Option<Inbound<ClientMessage>>>,
    sink: OutboundSink<ServerMessage>,
    request_handler: RequestHandler,
    notification_handler: NotificationHandler,
    error_handler: ErrorHandler,
    token: CancellationToken,
    transport_token: CancellationToken,
    tracker: TaskTracker,
    limit: Option<Arc<Semaphore>>,
}

impl ServerEngine {
    pub fn builder(transport: ServerTransport) -> ServerBuilder {
        ServerBuilder::new(transport)
    }

    /// Start reading from the transport. Calling it again has no effect.
    pub fn start(&self) {
        let inbound = self
            .inner
            .inbound
            .lock()
            .ok()
            .and_then(|mut inbound| inbound.take());
        let Some(inbound) = inbound else {
            debug!("Server engine already started");
            return;
        };

        let inner = self.inner.clone();
        self.inner.tracker.spawn(inner.receive_loop(inbound));
        debug!("Server engine started");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait until the inbound stream has ended (or the engine is closed)
    /// and every handler has finished and delivered its response
    pub async fn wait(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Cancel in-flight handlers, close the transport and wait for every
    /// task the engine started
    pub async fn close(&self) {
        self.inner.token.cancel();
        self.inner.transport_token.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        debug!("Server engine closed");
    }
}

impl ServerInner {
    async fn receive_loop(self: Arc<Self>, mut inbound: Inbound<ClientMessage>) {
        loop {
            let item = tokio::select! {
                _ = self.token.cancelled() => break,
                item = inbound.next() => item,
            };
            match item {
                Some(Ok(message)) => {
                    for item in message.into_items() {
                        self.dispatch(item);
                    }
                }
                Some(Err(e)) => self.reject(e),
                None => {
                    info!("Inbound stream ended");
                    break;
                }
            }
        }
        debug!("Server receive loop stopped");
    }

    fn dispatch(self: &Arc<Self>, item: ClientItem) {
        let inner = self.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = inner.token.cancelled() => debug!("Handler cancelled by shutdown"),
                _ = inner.handle(item) => {}
            }
        });
    }

    async fn handle(&self, item: ClientItem) {
        let _permit = match &self.limit {
            Some(limit) => match limit.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };

        match item {
            ClientItem::Request(request) => self.handle_request(request).await,
            ClientItem::Notification(notification) => self.handle_notification(notification).await,
        }
    }

    async fn handle_request(&self, request: Request) {
        let id = request.id.clone();
        let method = request.method.clone();
        trace!("Dispatching request {} ({})", id, method);

        let response = match self.isolate(self.request_handler.call(request)).await {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                let response = internal_failure(id, &method, &e);
                self.report(e);
                response
            }
            None => return,
        };
        self.deliver(response).await;
    }

    async fn handle_notification(&self, notification: Notification) {
        trace!("Dispatching notification {}", notification.method);
        if let Some(Err(e)) = self.isolate(self.notification_handler.call(notification)).await {
            self.report(e);
        }
    }

    /// Run a handler on its own task so a panic stays contained. Returns
    /// `None` if the task was cancelled.
    async fn isolate<T: Send + 'static>(&self, call: BoxFuture<'static, Result<T>>) -> Option<Result<T>> {
        let handle = self.tracker.spawn(call);
        // Dropping this future takes the handler task down with it
        let _abort = scopeguard::guard(handle.abort_handle(), |task| task.abort());
        match handle.await {
            Ok(result) => Some(result),
            Err(e) if e.is_panic() => Some(Err(Error::Handler(format!(
                "handler panicked: {}",
                panic_message(e.into_panic())
            )))),
            Err(_) => None,
        }
    }

    /// Inbound failures: report them, and answer undecodable payloads with
    /// an error response since their id is unknown
    fn reject(self: &Arc<Self>, error: Error) {
        if let Error::Decode(decode) = &error {
            let response = FailResponse::new(
                RequestId::Null,
                ResponseError::new(decode.code(), decode.to_string()),
            );
            let inner = self.clone();
            self.tracker.spawn(async move { inner.deliver(response.into()).await });
        }
        self.report(error);
    }

    async fn deliver(&self, response: ServerMessage) {
        if let Err(e) = self.sink.send(response).await {
            debug!("Failed to deliver response: {}", e);
            self.report(e);
        }
    }

    fn report(&self, error: Error) {
        self.tracker.spawn(self.error_handler.call(error));
    }
}

fn internal_failure(id: RequestId, method: &str, error: &Error) -> ServerMessage {
    let error = ResponseError::internal(error.to_string()).with_data(json!({
        "kind": error.kind().as_str(),
        "method": method,
    }));
    FailResponse::new(id, error).into()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
