use rpc_core::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::action::SendAction;

pub type ActionReceiver<T> = mpsc::Receiver<SendAction<T>>;

/// Outbound half of a transport.
///
/// Cloning gives another handle onto the same queue, so many callers can
/// write concurrently; the task draining the queue decides the order of
/// physical writes.
pub struct OutboundSink<T> {
    tx: mpsc::Sender<SendAction<T>>,
}

impl<T> Clone for OutboundSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> OutboundSink<T> {
    /// Create a sink and the receiver its writer task drains
    pub fn new(capacity: usize) -> (Self, ActionReceiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand `value` to the transport and wait until it is written or failed
    pub async fn send(&self, value: T) -> Result<()> {
        let (action, completion) = SendAction::new(value);
        self.enqueue(action).await?;
        completion.wait().await
    }

    /// Queue an action without waiting for its outcome.
    /// If the queue is gone the action is resolved with [`Error::Closed`].
    pub async fn enqueue(&self, action: SendAction<T>) -> Result<()> {
        if let Err(mpsc::error::SendError(action)) = self.tx.send(action).await {
            action.complete(Err(Error::Closed));
            return Err(Error::Closed);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Put a private queue in front of this sink.
    ///
    /// A background task takes each action from the new queue, applies
    /// `transform` and writes the result here, resolving the outer action
    /// with the inner outcome. Once `token` is cancelled the task stops and
    /// every action still queued is resolved with [`Error::Closed`].
    pub fn forward<U, F>(self, token: CancellationToken, capacity: usize, transform: F) -> OutboundSink<U>
    where
        U: Send + 'static,
        F: Fn(U) -> Result<T> + Send + 'static,
    {
        let (outer, mut actions) = OutboundSink::<U>::new(capacity);

        tokio::spawn(async move {
            loop {
                let action = tokio::select! {
                    _ = token.cancelled() => break,
                    action = actions.recv() => match action {
                        Some(action) => action,
                        None => break,
                    },
                };

                let (value, completer) = action.into_parts();
                let result = match transform(value) {
                    Ok(mapped) => tokio::select! {
                        _ = token.cancelled() => Err(Error::Closed),
                        result = self.send(mapped) => result,
                    },
                    Err(e) => Err(e),
                };
                trace!("Forwarded write completed: ok={}", result.is_ok());
                completer.complete(result);
            }

            fail_pending(actions);
            debug!("Forwarding task stopped");
        });

        outer
    }
}

/// Close `actions` and resolve everything still queued with [`Error::Closed`]
pub(crate) fn fail_pending<T>(mut actions: ActionReceiver<T>) {
    actions.close();
    let mut failed = 0usize;
    while let Ok(action) = actions.try_recv() {
        action.complete(Err(Error::Closed));
        failed += 1;
    }
    if failed > 0 {
        debug!("Failed {} queued write(s) on close", failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_resolves_with_writer_outcome() {
        let (sink, mut actions) = OutboundSink::<u32>::new(4);

        let writer = tokio::spawn(async move {
            let first = actions.recv().await.unwrap();
            assert_eq!(*first.value(), 1);
            first.complete(Ok(()));

            let second = actions.recv().await.unwrap();
            second.complete(Err(Error::Transport("disk full".into())));
        });

        assert!(sink.send(1).await.is_ok());
        assert!(matches!(sink.send(2).await, Err(Error::Transport(_))));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_closed() {
        let (sink, actions) = OutboundSink::<u32>::new(1);
        drop(actions);
        assert!(sink.is_closed());
        assert!(matches!(sink.send(1).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_forward_transforms_and_reports_transform_errors() {
        let (inner, mut actions) = OutboundSink::<String>::new(4);
        let token = CancellationToken::new();
        let outer = inner.forward(token.clone(), 4, |n: i32| {
            if n < 0 {
                Err(Error::Transport("negative".into()))
            } else {
                Ok(n.to_string())
            }
        });

        let writer = tokio::spawn(async move {
            let action = actions.recv().await.unwrap();
            let (value, completer) = action.into_parts();
            completer.complete(Ok(()));
            value
        });

        outer.send(12).await.unwrap();
        assert_eq!(writer.await.unwrap(), "12");
        assert!(matches!(outer.send(-1).await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_forward_fails_queued_writes_on_cancel() {
        // The inner writer never drains, so the first write blocks in flight
        let (inner, _actions) = OutboundSink::<u32>::new(1);
        let token = CancellationToken::new();
        let outer = inner.forward(token.clone(), 8, Ok);

        let pending: Vec<_> = (0..3)
            .map(|n| {
                let outer = outer.clone();
                tokio::spawn(async move { outer.send(n).await })
            })
            .collect();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        token.cancel();

        for handle in pending {
            assert!(matches!(handle.await.unwrap(), Err(Error::Closed)));
        }
    }
}
