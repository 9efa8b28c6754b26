use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// Multicast wrapper around a single inbound stream.
///
/// Every subscriber receives every item read after it subscribed, plus up
/// to `replay` earlier items. Subscriber queues are unbounded, so a slow
/// subscriber never makes another one miss items.
pub struct SharedInbound<T> {
    state: Arc<Mutex<SharedState<T>>>,
    source: Mutex<Option<BoxStream<'static, T>>>,
}

struct SharedState<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    history: VecDeque<T>,
    replay: usize,
    finished: bool,
}

/// Share `inbound` and start reading it right away
pub fn share<T: Clone + Send + 'static>(inbound: BoxStream<'static, T>, replay: usize) -> SharedInbound<T> {
    let shared = SharedInbound::new(inbound, replay);
    shared.start();
    shared
}

impl<T: Clone + Send + 'static> SharedInbound<T> {
    /// Wrap `inbound` without reading from it yet; see [`SharedInbound::start`]
    pub fn new(inbound: BoxStream<'static, T>, replay: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                subscribers: Vec::new(),
                history: VecDeque::with_capacity(replay),
                replay,
                finished: false,
            })),
            source: Mutex::new(Some(inbound)),
        }
    }

    /// A new view of the stream. After the source ends, new subscribers
    /// get the replayed items and then end.
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.state.lock() {
            Ok(mut state) => {
                for item in state.history.iter() {
                    let _ = tx.send(item.clone());
                }
                if !state.finished {
                    state.subscribers.push(tx);
                }
            }
            Err(e) => warn!("Shared inbound state poisoned: {}", e),
        }
        UnboundedReceiverStream::new(rx).boxed()
    }

    /// Start pumping the source into the subscribers. Only the first call
    /// has an effect.
    pub fn start(&self) {
        let source = match self.source.lock() {
            Ok(mut source) => source.take(),
            Err(_) => None,
        };
        let Some(mut source) = source else {
            return;
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(item) = source.next().await {
                let Ok(mut state) = state.lock() else {
                    break;
                };
                if state.replay > 0 {
                    if state.history.len() == state.replay {
                        state.history.pop_front();
                    }
                    state.history.push_back(item.clone());
                }
                state.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
            }

            if let Ok(mut state) = state.lock() {
                state.finished = true;
                // Dropping the senders ends every subscriber stream
                state.subscribers.clear();
            }
            debug!("Shared inbound source ended");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_every_subscriber_sees_every_item() {
        let shared = SharedInbound::new(stream::iter(vec![1, 2, 3]).boxed(), 0);
        let a = shared.subscribe();
        let b = shared.subscribe();
        shared.start();

        assert_eq!(a.collect::<Vec<_>>().await, vec![1, 2, 3]);
        assert_eq!(b.collect::<Vec<_>>().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_replay() {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = share(UnboundedReceiverStream::new(rx).boxed(), 2);
        let mut early = shared.subscribe();

        for n in 1..=3 {
            tx.send(n).unwrap();
        }
        // Wait until the pump has handled all three
        for expected in 1..=3 {
            assert_eq!(early.next().await, Some(expected));
        }

        let late = shared.subscribe();
        drop(tx);
        assert_eq!(late.collect::<Vec<_>>().await, vec![2, 3]);
    }
}
