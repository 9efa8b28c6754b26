//! Transport abstraction for the JSON-RPC engines.
//!
//! A [`Transport`] pairs an [`OutboundSink`] with an [`Inbound`] stream and a
//! cancellation token. Transports are layered by [`Transport::map`]: raw
//! text → JSON ([`Transport::json`]) → messages ([`Transport::jsonrpc`]) →
//! a client or server view ([`Transport::client`], [`Transport::server`],
//! [`Transport::peer`]).

pub mod action;
pub mod memory;
pub mod shared;
pub mod sink;
pub mod stdio;
pub mod tap;
pub mod transport;

pub use action::{Completer, Completion, SendAction};
pub use shared::{share, SharedInbound};
pub use sink::{ActionReceiver, OutboundSink};
pub use stdio::LineTransport;
pub use tap::Tap;
pub use transport::{ClientTransport, Inbound, ServerTransport, Transport, DEFAULT_CAPACITY};
pub use tokio_util::sync::CancellationToken;
