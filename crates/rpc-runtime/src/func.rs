use futures::future::BoxFuture;
use futures::FutureExt;
use rpc_core::{Error, Notification, Request, Result, ServerMessage, SuccessResponse};
use std::future::Future;
use std::sync::Arc;

/// A shared async function, the capability interceptors wrap.
///
/// Cloning is cheap; every clone calls the same underlying function.
pub struct Func<A, R> {
    f: Arc<dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync>,
}

impl<A, R> Clone for Func<A, R> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<A: Send + 'static, R: Send + 'static> Func<A, R> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self {
            f: Arc::new(move |arg| f(arg).boxed()),
        }
    }

    pub fn call(&self, arg: A) -> BoxFuture<'static, R> {
        (self.f)(arg)
    }
}

impl<A, R> std::fmt::Debug for Func<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Func")
    }
}

/// Client: send one request and wait for its response
pub type RequestFn = Func<Request, Result<SuccessResponse>>;

/// Client: hand one notification to the transport
pub type NotificationFn = Func<Notification, Result<()>>;

/// Answer one request
pub type RequestHandler = Func<Request, Result<ServerMessage>>;

/// Handle one notification
pub type NotificationHandler = Func<Notification, Result<()>>;

/// Receives failures nobody else is waiting for
pub type ErrorHandler = Func<Error, ()>;

/// Build an [`ErrorHandler`] from a plain callback
pub fn error_handler<F>(f: F) -> ErrorHandler
where
    F: Fn(Error) + Send + Sync + 'static,
{
    Func::new(move |error| {
        f(error);
        futures::future::ready(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_the_function() {
        let double = Func::new(|n: i32| async move { n * 2 });
        let copy = double.clone();
        assert_eq!(double.call(2).await, 4);
        assert_eq!(copy.call(5).await, 10);
    }
}
