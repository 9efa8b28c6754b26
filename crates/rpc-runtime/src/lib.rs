//! JSON-RPC 2.0 client and server engines.
//!
//! Both engines run on top of an `rpc_transport::Transport` and expose
//! their moving parts (transport, request and notification functions,
//! error handler) as [`Func`] capabilities that [`Interceptor`]s can wrap.

pub mod client;
pub mod func;
pub mod intercept;
pub mod server;

pub use client::{ClientBuilder, ClientEngine};
pub use func::{
    error_handler, ErrorHandler, Func, NotificationFn, NotificationHandler, RequestFn,
    RequestHandler,
};
pub use intercept::{BeforeInvoke, Catch, Chain, Interceptor, OnInvoke, Timeout, TimeoutSubject};
pub use server::{method_not_found, Router, ServerBuilder, ServerEngine};
