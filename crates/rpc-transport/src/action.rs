use rpc_core::{Error, Result};
use tokio::sync::oneshot;

/// A value on its way out, paired with a one-shot completion signal.
///
/// Whoever finally writes the value resolves the action with the outcome of
/// that write, so a failure deep inside a transport travels back to the
/// original sender. An action dropped without being resolved reads as
/// [`Error::Closed`] on the sender side.
#[derive(Debug)]
pub struct SendAction<T> {
    value: T,
    completer: Completer,
}

/// Resolves a [`SendAction`] exactly once
#[derive(Debug)]
pub struct Completer(oneshot::Sender<Result<()>>);

/// Sender-side view of a [`SendAction`]'s outcome
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<Result<()>>);

impl<T> SendAction<T> {
    pub fn new(value: T) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                value,
                completer: Completer(tx),
            },
            Completion(rx),
        )
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_parts(self) -> (T, Completer) {
        (self.value, self.completer)
    }

    /// Resolve without writing the value
    pub fn complete(self, result: Result<()>) {
        self.completer.complete(result);
    }
}

impl Completer {
    pub fn complete(self, result: Result<()>) {
        // The sender may have stopped waiting; nothing to report then.
        let _ = self.0.send(result);
    }
}

impl Completion {
    pub async fn wait(self) -> Result<()> {
        self.0.await.unwrap_or(Err(Error::Closed))
    }
}
