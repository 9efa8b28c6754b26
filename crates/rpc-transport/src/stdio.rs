//! Line-oriented transport: one JSON message per line.

use futures::future::ready;
use futures::{SinkExt, StreamExt};
use rpc_core::config::TransportConfig;
use rpc_core::{DecodeError, Error};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::sink::{fail_pending, OutboundSink};
use crate::transport::Transport;

/// Raw text transport framed one message per line
pub type LineTransport = Transport<String, String>;

/// Transport over the process's stdin and stdout
pub fn stdio(config: &TransportConfig) -> LineTransport {
    lines(tokio::io::stdin(), tokio::io::stdout(), config)
}

/// Transport over any reader/writer pair, framed by newlines.
///
/// A single writer task owns `writer`, so lines from concurrent senders are
/// never interleaved. Blank inbound lines are ignored. A line longer than
/// `max_line_length` is reported as a parse failure and ends the inbound
/// stream, as does a read error.
pub fn lines<R, W>(reader: R, writer: W, config: &TransportConfig) -> LineTransport
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let token = CancellationToken::new();
    let (sink, mut actions) = OutboundSink::<String>::new(config.channel_capacity);

    let writer_token = token.clone();
    tokio::spawn(async move {
        let mut framed = FramedWrite::new(writer, LinesCodec::new());
        loop {
            let action = tokio::select! {
                _ = writer_token.cancelled() => break,
                action = actions.recv() => match action {
                    Some(action) => action,
                    None => break,
                },
            };
            let (line, completer) = action.into_parts();
            trace!("Sending: {}", line);
            let written = tokio::select! {
                _ = writer_token.cancelled() => None,
                result = framed.send(line) => Some(result),
            };
            let result = match written {
                Some(result) => result.map_err(|e| Error::Transport(e.to_string())),
                None => {
                    completer.complete(Err(Error::Closed));
                    break;
                }
            };
            if let Err(e) = &result {
                warn!("Write failed: {}", e);
            }
            completer.complete(result);
        }
        fail_pending(actions);
        if !writer_token.is_cancelled() {
            let _ = SinkExt::<String>::close(&mut framed).await;
        }
        debug!("Line writer stopped");
    });

    let inbound = FramedRead::new(
        reader,
        LinesCodec::new_with_max_length(config.max_line_length),
    )
    .filter_map(|item| {
        ready(match item {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => {
                trace!("Received: {}", line);
                Some(Ok(line))
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => Some(Err(Error::Decode(
                DecodeError::Parse("line exceeds the maximum length".to_string()),
            ))),
            Err(LinesCodecError::Io(e)) => Some(Err(Error::Transport(e.to_string()))),
        })
    })
    .take_until(token.clone().cancelled_owned())
    .boxed();

    Transport::new(sink, inbound, token, config.channel_capacity)
}
