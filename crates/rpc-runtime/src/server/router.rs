use rpc_core::{Error, FailResponse, Notification, Request, ResponseError, Result, ServerMessage, SuccessResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::func::{Func, NotificationHandler, RequestHandler};

pub type MethodFn = Func<Option<Value>, Result<Value>>;
pub type NotifyFn = Func<Option<Value>, Result<()>>;

/// Maps method names to handlers.
///
/// A method handler returns the `result` value. Returning
/// [`Error::Remote`] answers with that error object as-is, which is how a
/// handler reports bad params; any other error becomes an internal error.
/// Unknown methods are answered with METHOD_NOT_FOUND, unknown
/// notifications are ignored.
#[derive(Default, Clone)]
pub struct Router {
    methods: HashMap<String, MethodFn>,
    notifications: HashMap<String, NotifyFn>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.methods.insert(name.into(), Func::new(handler));
        self
    }

    pub fn notification<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.notifications.insert(name.into(), Func::new(handler));
        self
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn request_handler(&self) -> RequestHandler {
        let methods = Arc::new(self.methods.clone());
        Func::new(move |request: Request| {
            let handler = methods.get(&request.method).cloned();
            async move {
                let Some(handler) = handler else {
                    debug!("No route for method {}", request.method);
                    return Ok(method_not_found(request));
                };
                match handler.call(request.params).await {
                    Ok(result) => Ok(SuccessResponse::new(request.id, result).into()),
                    Err(Error::Remote(error)) => Ok(FailResponse::new(request.id, error).into()),
                    Err(e) => Err(e),
                }
            }
        })
    }

    pub fn notification_handler(&self) -> NotificationHandler {
        let notifications = Arc::new(self.notifications.clone());
        Func::new(move |notification: Notification| {
            let handler = notifications.get(&notification.method).cloned();
            async move {
                match handler {
                    Some(handler) => handler.call(notification.params).await,
                    None => {
                        debug!("Ignoring notification {}", notification.method);
                        Ok(())
                    }
                }
            }
        })
    }
}

/// Answer for a request nobody handles
pub fn method_not_found(request: Request) -> ServerMessage {
    let error = ResponseError::method_not_found(&request.method);
    FailResponse::new(request.id, error).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_core::{ErrorCode, RequestId};
    use serde_json::json;

    fn router() -> Router {
        Router::new()
            .method("echo", |params| async move { Ok(params.unwrap_or(Value::Null)) })
            .method("strict", |_| async move {
                Err(Error::Remote(ResponseError::invalid_params("expected an array")))
            })
            .method("broken", |_| async move { Err(Error::Handler("boom".into())) })
    }

    #[tokio::test]
    async fn test_routes_by_method_name() {
        let handler = router().request_handler();
        let response = handler
            .call(Request::new(1, "echo", Some(json!([1, 2]))))
            .await
            .unwrap();
        assert_eq!(
            response,
            ServerMessage::Success(SuccessResponse::new(RequestId::Number(1), json!([1, 2])))
        );
    }

    #[tokio::test]
    async fn test_unknown_method_and_remote_errors_are_answers() {
        let handler = router().request_handler();

        match handler.call(Request::new(2, "missing", None)).await.unwrap() {
            ServerMessage::Fail(fail) => assert_eq!(fail.error.code, ErrorCode::METHOD_NOT_FOUND),
            other => panic!("unexpected {:?}", other),
        }
        match handler.call(Request::new(3, "strict", None)).await.unwrap() {
            ServerMessage::Fail(fail) => assert_eq!(fail.error.code, ErrorCode::INVALID_PARAMS),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            handler.call(Request::new(4, "broken", None)).await,
            Err(Error::Handler(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_notification_is_ignored() {
        let handler = router().notification_handler();
        assert!(handler.call(Notification::new("nobody", None)).await.is_ok());
    }
}
