//! In-memory transport pair for tests and in-process harnesses.

use futures::StreamExt;
use rpc_core::{Error, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::sink::{fail_pending, OutboundSink};
use crate::transport::Transport;

/// Two raw text transports wired back to back: what one side sends, the
/// other receives, in order.
///
/// A send is acknowledged once the text sits in the peer's inbound queue.
/// Closing one side ends its inbound stream and, once its writer has
/// stopped, the peer's inbound stream as well.
pub fn pair(capacity: usize) -> (Transport<String, String>, Transport<String, String>) {
    let (a_to_b, b_inbox) = mpsc::unbounded_channel();
    let (b_to_a, a_inbox) = mpsc::unbounded_channel();
    (
        endpoint("a", a_to_b, a_inbox, capacity),
        endpoint("b", b_to_a, b_inbox, capacity),
    )
}

fn endpoint(
    name: &'static str,
    peer: mpsc::UnboundedSender<String>,
    inbox: mpsc::UnboundedReceiver<String>,
    capacity: usize,
) -> Transport<String, String> {
    let token = CancellationToken::new();
    let (sink, mut actions) = OutboundSink::new(capacity);

    let writer_token = token.clone();
    tokio::spawn(async move {
        loop {
            let action = tokio::select! {
                _ = writer_token.cancelled() => break,
                action = actions.recv() => match action {
                    Some(action) => action,
                    None => break,
                },
            };
            let (text, completer) = action.into_parts();
            trace!("memory[{}] -> {}", name, text);
            let result: Result<()> = peer
                .send(text)
                .map_err(|_| Error::Transport("peer endpoint is gone".to_string()));
            completer.complete(result);
        }
        fail_pending(actions);
        debug!("memory[{}] writer stopped", name);
    });

    let inbound = UnboundedReceiverStream::new(inbox)
        .map(Ok)
        .take_until(token.clone().cancelled_owned())
        .boxed();

    Transport::new(sink, inbound, token, capacity)
}
