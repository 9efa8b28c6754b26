//! Interceptors: transforms from a capability to a capability of the same
//! shape.
//!
//! Applying A and then B yields `B(A(base))`, so the interceptor applied
//! last sees a call first. Any `Fn(C) -> C` closure is an interceptor; the
//! types here cover the common cases for [`Func`]s that return [`Result`].

use rpc_core::{Error, ErrorKind, Notification, Request, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::func::Func;

pub trait Interceptor<C>: Send + Sync {
    fn intercept(&self, capability: C) -> C;
}

impl<C, F> Interceptor<C> for F
where
    F: Fn(C) -> C + Send + Sync,
{
    fn intercept(&self, capability: C) -> C {
        self(capability)
    }
}

/// An ordered list of interceptors for one interception point
pub struct Chain<C> {
    interceptors: Vec<Box<dyn Interceptor<C>>>,
}

impl<C> Default for Chain<C> {
    fn default() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }
}

impl<C> Chain<C> {
    pub fn push(&mut self, interceptor: impl Interceptor<C> + 'static) {
        self.interceptors.push(Box::new(interceptor));
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap `base` with every interceptor, in the order they were pushed
    pub fn apply(&self, base: C) -> C {
        self.interceptors
            .iter()
            .fold(base, |capability, interceptor| interceptor.intercept(capability))
    }
}

/// What a [`Timeout`] reports about the call that ran out of time
pub trait TimeoutSubject {
    fn timed_out_request(&self) -> Option<Request> {
        None
    }
}

impl TimeoutSubject for Request {
    fn timed_out_request(&self) -> Option<Request> {
        Some(self.clone())
    }
}

impl TimeoutSubject for Notification {}
impl TimeoutSubject for Error {}

/// Fails with [`Error::Timeout`] when the wrapped call takes longer than
/// the given duration. The inner call is dropped at that point.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<A, R> Interceptor<Func<A, Result<R>>> for Timeout
where
    A: TimeoutSubject + Send + 'static,
    R: Send + 'static,
{
    fn intercept(&self, inner: Func<A, Result<R>>) -> Func<A, Result<R>> {
        let duration = self.duration;
        Func::new(move |arg: A| {
            let inner = inner.clone();
            async move {
                let request = arg.timed_out_request();
                match tokio::time::timeout(duration, inner.call(arg)).await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!("Call timed out after {:?}", duration);
                        Err(Error::timeout(request, duration))
                    }
                }
            }
        })
    }
}

/// Recovers from failures of one [`ErrorKind`]; other failures pass through
pub struct Catch<R> {
    kind: ErrorKind,
    recover: Arc<dyn Fn(Error) -> Result<R> + Send + Sync>,
}

impl<R> Catch<R> {
    pub fn new(kind: ErrorKind, recover: impl Fn(Error) -> Result<R> + Send + Sync + 'static) -> Self {
        Self {
            kind,
            recover: Arc::new(recover),
        }
    }
}

impl<A, R> Interceptor<Func<A, Result<R>>> for Catch<R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn intercept(&self, inner: Func<A, Result<R>>) -> Func<A, Result<R>> {
        let kind = self.kind;
        let recover = self.recover.clone();
        Func::new(move |arg: A| {
            let inner = inner.clone();
            let recover = recover.clone();
            async move {
                match inner.call(arg).await {
                    Err(e) if e.kind() == kind => recover(e),
                    other => other,
                }
            }
        })
    }
}

/// Sees every input before the wrapped call runs
pub struct BeforeInvoke<A> {
    hook: Arc<dyn Fn(&A) + Send + Sync>,
}

impl<A> BeforeInvoke<A> {
    pub fn new(hook: impl Fn(&A) + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
        }
    }
}

impl<A, R> Interceptor<Func<A, R>> for BeforeInvoke<A>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn intercept(&self, inner: Func<A, R>) -> Func<A, R> {
        let hook = self.hook.clone();
        Func::new(move |arg: A| {
            hook(&arg);
            inner.call(arg)
        })
    }
}

/// Sees every outcome after the wrapped call completes
pub struct OnInvoke<R> {
    hook: Arc<dyn Fn(&R) + Send + Sync>,
}

impl<R> OnInvoke<R> {
    pub fn new(hook: impl Fn(&R) + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
        }
    }
}

impl<A, R> Interceptor<Func<A, R>> for OnInvoke<R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn intercept(&self, inner: Func<A, R>) -> Func<A, R> {
        let hook = self.hook.clone();
        Func::new(move |arg: A| {
            let call = inner.call(arg);
            let hook = hook.clone();
            async move {
                let outcome = call.await;
                hook(&outcome);
                outcome
            }
        })
    }
}
